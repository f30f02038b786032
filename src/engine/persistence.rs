use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::engine::store::Store;
use crate::engine::vault;
use crate::{Error, Result};

/// Format tag prefixed to encrypted store files, followed by a version byte.
const MAGIC: &[u8] = b"TBST\x01";

/// Process-wide lock table keyed by destination path, so that concurrent
/// persist/load calls against the same file serialize instead of
/// interleaving writes. There is no cross-process coordination.
static FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let locks = FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = locks.lock().unwrap();
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `payload` to `path` atomically (write-then-rename), wrapping it in
/// the encrypted container format when a password is given.
pub fn write_payload(path: &Path, payload: &[u8], password: Option<&str>) -> Result<()> {
    let lock = path_lock(path);
    let _guard = lock.lock().unwrap();

    let bytes = match password {
        Some(password) => {
            let key = vault::derive_key(password);
            let mut out = MAGIC.to_vec();
            out.extend_from_slice(&vault::seal(payload, &key)?);
            out
        }
        None => payload.to_vec(),
    };

    let temp = temp_path(path);
    fs::write(&temp, &bytes).map_err(|e| Error::Persistence {
        path: temp.clone(),
        source: e,
    })?;
    fs::rename(&temp, path).map_err(|e| Error::Persistence {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Reads the payload written by [`write_payload`], decrypting when the file
/// carries the encrypted container tag.
///
/// A password mismatch in either direction is an error: an encrypted file
/// without a password, a plain file with one, or a wrong password all fail
/// with [`Error::Decryption`] rather than yielding garbage.
pub fn read_payload(path: &Path, password: Option<&str>) -> Result<Vec<u8>> {
    let lock = path_lock(path);
    let _guard = lock.lock().unwrap();

    let bytes = fs::read(path).map_err(|e| Error::Persistence {
        path: path.to_path_buf(),
        source: e,
    })?;

    match (bytes.starts_with(MAGIC), password) {
        (true, Some(password)) => {
            let key = vault::derive_key(password);
            vault::open(&bytes[MAGIC.len()..], &key)
        }
        (true, None) => Err(Error::Decryption(
            "store file is encrypted; a password is required".to_string(),
        )),
        (false, Some(_)) => Err(Error::Decryption(
            "store file is not encrypted".to_string(),
        )),
        (false, None) => Ok(bytes),
    }
}

/// Serializes `store` to `path` as pretty-printed JSON, optionally inside
/// the encrypted container.
pub fn persist<P: AsRef<Path>>(store: &Store, path: P, password: Option<&str>) -> Result<()> {
    let payload = serde_json::to_vec_pretty(store)?;
    write_payload(path.as_ref(), &payload, password)
}

/// Loads a store persisted with [`Store::persist`].
///
/// Round-trip contract: loading a persisted store yields a store equal to
/// the original, record for record, in the same order.
pub fn load<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Store> {
    let payload = read_payload(path.as_ref(), password)?;
    Ok(serde_json::from_slice(&payload)?)
}
