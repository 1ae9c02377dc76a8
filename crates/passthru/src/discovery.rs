//! Enumeration of installed Pass-Thru driver registrations.
//!
//! Vendors register their 04.04 interfaces under a well-known registry
//! path; each entry carries a display name for device pickers and the
//! path of the library to hand to [`crate::PassThruDriver::load`].

use std::io;

use winreg::enums::HKEY_LOCAL_MACHINE;
use winreg::RegKey;

/// One registered Pass-Thru interface.
#[derive(Debug, Clone)]
pub struct DriverListing {
    /// Display name, e.g. "OpenPort 2.0 J2534 ISO/CAN/VPW/PWM".
    pub name: String,
    /// Vendor name, when the registration carries one.
    pub vendor: String,
    /// Absolute path of the vendor library.
    pub library_path: String,
}

/// List every Pass-Thru 04.04 interface registered on this machine.
///
/// Registrations from 32-bit installers land under `Wow6432Node` on
/// 64-bit hosts, so both hives are walked. A missing hive simply yields
/// no listings.
pub fn installed_drivers() -> io::Result<Vec<DriverListing>> {
    let mut listings = Vec::new();
    for root in [
        r"SOFTWARE\PassThruSupport.04.04",
        r"SOFTWARE\Wow6432Node\PassThruSupport.04.04",
    ] {
        collect_from(root, &mut listings)?;
    }
    Ok(listings)
}

fn collect_from(root: &str, listings: &mut Vec<DriverListing>) -> io::Result<()> {
    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let support = match hklm.open_subkey(root) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        other => other?,
    };

    for key_name in support.enum_keys() {
        let device = support.open_subkey(key_name?)?;
        let name: String = device.get_value("Name")?;
        let library_path: String = device.get_value("FunctionLibrary")?;
        let vendor: String = device.get_value("Vendor").unwrap_or_default();
        listings.push(DriverListing {
            name,
            vendor,
            library_path,
        });
    }
    Ok(())
}
