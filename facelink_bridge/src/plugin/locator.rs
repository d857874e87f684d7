//! Locates and instantiates the entry module inside a loaded library.
//!
//! The library exports one registry symbol describing its modules; selection
//! compares each descriptor's base-contract *name* against the fixed constant.
//! Name comparison is deliberate: the module was compiled against its own SDK
//! build, so no shared type identity exists across the load boundary.

use crate::error::{BridgeError, BridgeResult};
use facelink_api::{
    ModuleDescriptor, ModuleRegistryFn, TrackingModule, FACELINK_ABI, MODULE_REGISTRY_SYMBOL,
    TRACKING_MODULE_BASE,
};
use libloading::Library;
use log::{info, warn};
use std::path::Path;

/// Pick the entry descriptor: first concrete descriptor in declaration order
/// whose base-contract name matches. Abstract descriptors (no constructor)
/// are skipped. Later matches are ignored — known ambiguity, first wins.
pub fn select(modules: &[ModuleDescriptor]) -> Option<&ModuleDescriptor> {
    modules
        .iter()
        .find(|d| d.constructor.is_some() && d.base_contract == TRACKING_MODULE_BASE)
}

/// Resolve the registry in `library`, validate its ABI, and instantiate the
/// entry module. `origin` is only used for error reporting.
pub fn locate(library: &Library, origin: &Path) -> BridgeResult<Box<dyn TrackingModule>> {
    // SAFETY: the registry symbol's signature is fixed by the contract crate;
    // a library exporting it under a different signature is malformed input
    // we cannot defend against, same as any dlopen host.
    let registry = unsafe {
        let registry_fn = library
            .get::<ModuleRegistryFn>(MODULE_REGISTRY_SYMBOL.as_bytes())
            .map_err(|e| {
                BridgeError::load(format!(
                    "'{}' exports no module registry: {}",
                    origin.display(),
                    e
                ))
            })?;
        registry_fn()
    };

    if registry.abi != FACELINK_ABI {
        return Err(BridgeError::AbiMismatch {
            expected: FACELINK_ABI,
            found: registry.abi,
        });
    }

    let matches = registry
        .modules
        .iter()
        .filter(|d| d.constructor.is_some() && d.base_contract == TRACKING_MODULE_BASE)
        .count();
    if matches > 1 {
        warn!(
            "'{}' exports {} matching modules; selecting the first",
            origin.display(),
            matches
        );
    }

    let descriptor = select(registry.modules)
        .ok_or_else(|| BridgeError::NoEntryType(origin.display().to_string()))?;

    info!("selected module '{}' from '{}'", descriptor.name, origin.display());

    // SAFETY: the constructor came from a registry that passed the ABI check.
    let module = unsafe { (descriptor.constructor.expect("selected descriptor is concrete"))() };
    Ok(module)
}
