//! Drives the instantiated module through its lifecycle.
//!
//! The adapter owns the canonical tracking data and hands the module a
//! `&mut` each tick — dependency injection instead of a discoverable global,
//! so there is exactly one instance and both sides agree on it by
//! construction.

use crate::error::{BridgeError, BridgeResult};
use crate::plugin::locator;
use crate::plugin::resolve::ResolutionContext;
use facelink_api::{Capabilities, ModuleError, TrackingModule, UnifiedTrackingData};
use libloading::Library;
use log::{error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// A bound module plus everything keeping it callable.
///
/// Field order matters: the module object drops before the library that
/// contains its code, and the resolution context (holding preloaded
/// dependency handles) drops last.
pub struct ModuleAdapter {
    name: String,
    module: Box<dyn TrackingModule>,
    data: UnifiedTrackingData,
    capabilities: Capabilities,
    bound: bool,
    torn_down: bool,
    _library: Option<Library>,
    _resolver: Option<ResolutionContext>,
}

impl ModuleAdapter {
    /// Load a module library from disk: build the resolution scope, preload
    /// plugin-local dependencies, load the library, locate the entry module.
    /// Every failure here is fatal to the process.
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let mut resolver = ResolutionContext::new(path)?;
        resolver.preload()?;

        let plugin_path = resolver.plugin_path().to_path_buf();
        // SAFETY: loading a user-specified module library is the purpose of
        // this process; its initializers run here, as with any dlopen host.
        let library = unsafe { Library::new(&plugin_path) }.map_err(|e| {
            BridgeError::load(format!("failed to load '{}': {}", plugin_path.display(), e))
        })?;

        let module = locator::locate(&library, &plugin_path)?;
        let name = plugin_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());

        info!(
            "loaded '{}' ({} dependency libraries preloaded)",
            name,
            resolver.preloaded_count()
        );

        Ok(Self {
            name,
            module,
            data: UnifiedTrackingData::default(),
            capabilities: Capabilities::default(),
            bound: false,
            torn_down: false,
            _library: Some(library),
            _resolver: Some(resolver),
        })
    }

    /// Wrap a statically linked module. Test seam, and the path a built-in
    /// fallback module would take.
    pub fn in_process(name: &str, module: Box<dyn TrackingModule>) -> Self {
        Self {
            name: name.to_string(),
            module,
            data: UnifiedTrackingData::default(),
            capabilities: Capabilities::default(),
            bound: false,
            torn_down: false,
            _library: None,
            _resolver: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initialize the module, requesting everything. A fault here is fatal
    /// and the module never becomes bound, so teardown will not be invoked.
    pub fn initialize(&mut self) -> BridgeResult<Capabilities> {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.module.initialize(Capabilities::ALL)
        }))
        .unwrap_or_else(|_| Err(ModuleError::fault("module panicked during initialize")));

        match result {
            Ok(granted) => {
                self.capabilities = granted;
                self.bound = true;
                info!(
                    "'{}' initialized (eye: {}, expression: {})",
                    self.name, granted.eye, granted.expression
                );
                if !granted.any() {
                    warn!("'{}' reports no supported capabilities", self.name);
                }
                Ok(granted)
            }
            Err(e) => Err(BridgeError::Initialize(format!("'{}': {}", self.name, e))),
        }
    }

    /// Run one update cycle. An `Err` abandons the current tick only; the
    /// tracking data keeps its previous frame.
    pub fn update(&mut self) -> Result<(), ModuleError> {
        catch_unwind(AssertUnwindSafe(|| self.module.update(&mut self.data)))
            .unwrap_or_else(|_| Err(ModuleError::fault("module panicked during update")))
    }

    /// Last successfully written frame.
    pub fn data(&self) -> &UnifiedTrackingData {
        &self.data
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Release the module, exactly once, best-effort. Only invoked after a
    /// successful initialize; faults are swallowed and logged.
    pub fn teardown(&mut self) {
        if !self.bound || self.torn_down {
            return;
        }
        self.torn_down = true;
        if catch_unwind(AssertUnwindSafe(|| self.module.teardown())).is_err() {
            error!("'{}' panicked during teardown", self.name);
        }
    }
}

impl std::fmt::Debug for ModuleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleAdapter")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("bound", &self.bound)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl Drop for ModuleAdapter {
    fn drop(&mut self) {
        // Backstop for exit paths that did not reach the orderly teardown.
        self.teardown();
    }
}
