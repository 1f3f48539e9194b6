use std::ptr;

use log::debug;
use sysproxy_backend::BackendError;
use windows_sys::Win32::Foundation::ERROR_FILE_NOT_FOUND;
use windows_sys::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_DWORD, REG_SZ, RegCloseKey,
    RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};

use crate::store::{RegValue, SettingsStore};

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// An open `HKEY_CURRENT_USER` subkey, closed on drop.
pub struct RegistryStore {
    hkey: HKEY,
    path: String,
}

// The handle is only used through `&mut self` or `&self` behind the
// backend's mutex.
unsafe impl Send for RegistryStore {}

impl RegistryStore {
    pub fn open(path: &str) -> Result<Self, BackendError> {
        let subkey = wide(path);
        let mut hkey: HKEY = ptr::null_mut();
        let status = unsafe {
            RegOpenKeyExW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                0,
                KEY_QUERY_VALUE | KEY_SET_VALUE,
                &mut hkey,
            )
        };
        if status != 0 {
            return Err(BackendError::command(
                path,
                format!("RegOpenKeyExW failed: {status}"),
            ));
        }
        debug!("Opened HKCU\\{path}");
        Ok(Self {
            hkey,
            path: path.to_string(),
        })
    }
}

impl Drop for RegistryStore {
    fn drop(&mut self) {
        unsafe {
            RegCloseKey(self.hkey);
        }
    }
}

impl SettingsStore for RegistryStore {
    fn get(&self, name: &str) -> Result<Option<RegValue>, BackendError> {
        let value_name = wide(name);
        let mut kind = 0u32;
        let mut size = 0u32;

        let status = unsafe {
            RegQueryValueExW(
                self.hkey,
                value_name.as_ptr(),
                ptr::null(),
                &mut kind,
                ptr::null_mut(),
                &mut size,
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != 0 {
            return Err(BackendError::command(
                name,
                format!("RegQueryValueExW failed: {status}"),
            ));
        }

        let mut buffer = vec![0u16; (size as usize).div_ceil(2).max(2)];
        let mut size = u32::try_from(buffer.len() * 2).unwrap_or(u32::MAX);
        let status = unsafe {
            RegQueryValueExW(
                self.hkey,
                value_name.as_ptr(),
                ptr::null(),
                &mut kind,
                buffer.as_mut_ptr().cast::<u8>(),
                &mut size,
            )
        };
        if status != 0 {
            return Err(BackendError::command(
                name,
                format!("RegQueryValueExW failed: {status}"),
            ));
        }

        match kind {
            REG_DWORD => Ok(Some(RegValue::Dword(
                u32::from(buffer[0]) | (u32::from(buffer[1]) << 16),
            ))),
            REG_SZ => {
                let units = &buffer[..(size as usize) / 2];
                let end = units.iter().position(|unit| *unit == 0).unwrap_or(units.len());
                Ok(Some(RegValue::String(String::from_utf16_lossy(&units[..end]))))
            }
            other => Err(BackendError::malformed(
                format!("{}\\{name}", self.path),
                format!("unsupported registry type {other}"),
            )),
        }
    }

    fn set(&mut self, name: &str, value: RegValue) -> Result<(), BackendError> {
        let value_name = wide(name);
        let status = match value {
            RegValue::Dword(number) => {
                let bytes = number.to_le_bytes();
                unsafe {
                    RegSetValueExW(
                        self.hkey,
                        value_name.as_ptr(),
                        0,
                        REG_DWORD,
                        bytes.as_ptr(),
                        4,
                    )
                }
            }
            RegValue::String(text) => {
                let data = wide(&text);
                let byte_len = u32::try_from(data.len() * 2).unwrap_or(u32::MAX);
                unsafe {
                    RegSetValueExW(
                        self.hkey,
                        value_name.as_ptr(),
                        0,
                        REG_SZ,
                        data.as_ptr().cast::<u8>(),
                        byte_len,
                    )
                }
            }
        };
        if status != 0 {
            return Err(BackendError::command(
                name,
                format!("RegSetValueExW failed: {status}"),
            ));
        }
        Ok(())
    }
}
