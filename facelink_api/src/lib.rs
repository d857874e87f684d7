//! # facelink API
//!
//! The versioned capability contract between the facelink bridge and tracking
//! modules. A module is a dynamic library compiled against this crate; the
//! bridge resolves its registry symbol at load time and drives the selected
//! module through the [`TrackingModule`] trait.
//!
//! This crate is the *host-shared* half of the load partition: both the bridge
//! and every module link the same build of these types, so tracking data
//! crosses the boundary as plain `&mut` references with no per-call lookup.
//!
//! # Example: exporting a module
//!
//! ```rust,ignore
//! use facelink_api::{export_tracking_modules, Capabilities, ModuleError, TrackingModule,
//!                    UnifiedTrackingData};
//!
//! #[derive(Default)]
//! struct WebcamModule;
//!
//! impl TrackingModule for WebcamModule {
//!     fn initialize(&mut self, requested: Capabilities) -> Result<Capabilities, ModuleError> {
//!         Ok(Capabilities { eye: requested.eye, expression: false })
//!     }
//!
//!     fn update(&mut self, data: &mut UnifiedTrackingData) -> Result<(), ModuleError> {
//!         data.eye.left.openness = 1.0;
//!         Ok(())
//!     }
//!
//!     fn teardown(&mut self) {}
//! }
//!
//! export_tracking_modules!(WebcamModule);
//! ```

mod expressions;

pub use expressions::UnifiedExpressions;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-exported for the `export_tracking_modules!` macro expansion.
#[doc(hidden)]
pub use paste;

/// ABI version of this contract. Bumped on any change to the trait, the
/// registry types, or the tracking data layout. The bridge refuses modules
/// built against a different version.
pub const FACELINK_ABI: u32 = 1;

/// Symbol every module library exports to describe its modules.
pub const MODULE_REGISTRY_SYMBOL: &str = "facelink_module_registry";

/// Name of the base contract a descriptor must claim to be selectable as a
/// tracking module. Matched by name, not type identity: the module was built
/// against its own copy of the SDK and only structural equivalence is
/// available across the load boundary.
pub const TRACKING_MODULE_BASE: &str = "ExtTrackingModule";

// ============================================================================
// Tracking data model
// ============================================================================

/// Per-eye tracking state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSingleEyeData {
    /// Normalized gaze direction. Modules with a two-dimensional source write
    /// x/y and leave z at its zeroed default.
    pub gaze: Vec3,
    pub pupil_diameter_mm: f32,
    pub openness: f32,
}

/// Combined eye state for both eyes plus global dilation bounds.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEyeData {
    pub left: UnifiedSingleEyeData,
    pub right: UnifiedSingleEyeData,
    pub max_dilation: f32,
    pub min_dilation: f32,
    pub left_diameter: f32,
    pub right_diameter: f32,
}

/// A single expression shape weight.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnifiedExpressionShape {
    pub weight: f32,
}

/// Head pose: Euler orientation plus position.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedHeadData {
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub head_roll: f32,
    pub head_pos_x: f32,
    pub head_pos_y: f32,
    pub head_pos_z: f32,
}

/// The full per-frame tracking snapshot a module writes each update.
///
/// The bridge owns the canonical instance and hands modules a `&mut` at call
/// time — there is no shared global to discover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTrackingData {
    pub eye: UnifiedEyeData,
    pub shapes: Vec<UnifiedExpressionShape>,
    pub head: UnifiedHeadData,
}

impl Default for UnifiedTrackingData {
    fn default() -> Self {
        Self {
            eye: UnifiedEyeData::default(),
            shapes: vec![UnifiedExpressionShape::default(); UnifiedExpressions::Max as usize],
            head: UnifiedHeadData::default(),
        }
    }
}

// ============================================================================
// Module contract
// ============================================================================

/// What a module can track. The bridge requests capabilities at initialize;
/// the module reports what it actually supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub eye: bool,
    pub expression: bool,
}

impl Capabilities {
    /// Request everything.
    pub const ALL: Self = Self {
        eye: true,
        expression: true,
    };

    /// True if at least one capability is supported.
    pub fn any(self) -> bool {
        self.eye || self.expression
    }
}

/// Faults a module can report to its host.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The tracking device is missing or went away.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The host requested capabilities this module cannot provide.
    #[error("unsupported capability: {0}")]
    Unsupported(String),

    /// Anything else that aborts the current operation.
    #[error("module fault: {0}")]
    Fault(String),
}

impl ModuleError {
    pub fn fault<S: Into<String>>(msg: S) -> Self {
        ModuleError::Fault(msg.into())
    }

    pub fn device_unavailable<S: Into<String>>(msg: S) -> Self {
        ModuleError::DeviceUnavailable(msg.into())
    }
}

/// The operations the bridge drives on a loaded module.
///
/// Lifecycle: `initialize` once, `update` once per tick, `teardown` once on
/// every exit path after a successful initialize. An `Err` from `initialize`
/// is fatal to the host; an `Err` from `update` abandons that tick only.
pub trait TrackingModule: Send {
    /// Negotiate capabilities and acquire the device.
    fn initialize(&mut self, requested: Capabilities) -> Result<Capabilities, ModuleError>;

    /// Write the current frame into `data`.
    fn update(&mut self, data: &mut UnifiedTrackingData) -> Result<(), ModuleError>;

    /// Release the device. Must be safe to call once after initialize.
    fn teardown(&mut self);
}

// ============================================================================
// Module registry (the load-time function table)
// ============================================================================

/// Constructor for one module instance.
#[allow(improper_ctypes_definitions)]
pub type ModuleCtorFn = unsafe extern "C" fn() -> Box<dyn TrackingModule>;

/// Signature of the registry symbol a module library exports.
#[allow(improper_ctypes_definitions)]
pub type ModuleRegistryFn = unsafe extern "C" fn() -> &'static ModuleRegistry;

/// Everything a module library declares about itself, resolved once at load.
#[derive(Debug)]
pub struct ModuleRegistry {
    /// Must equal [`FACELINK_ABI`] or the host refuses the library.
    pub abi: u32,
    /// Exported modules in declaration order. Selection is first-match.
    pub modules: &'static [ModuleDescriptor],
}

/// One exported module: its name, the contract it claims to implement, and a
/// constructor. A descriptor without a constructor is abstract and is skipped
/// during selection.
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub base_contract: &'static str,
    pub constructor: Option<ModuleCtorFn>,
}

/// Export one or more tracking modules from a `cdylib`.
///
/// Each argument is a type in scope implementing [`TrackingModule`] +
/// [`Default`]. Generates the registry symbol the bridge resolves at load
/// time; modules are listed in argument order.
#[macro_export]
macro_rules! export_tracking_modules {
    ($($module:ident),+ $(,)?) => {
        $crate::paste::paste! {
            $(
                #[allow(non_snake_case, improper_ctypes_definitions)]
                unsafe extern "C" fn [<__facelink_ctor_ $module>]() -> Box<dyn $crate::TrackingModule> {
                    Box::new(<$module as Default>::default())
                }
            )+

            static __FACELINK_MODULES: &[$crate::ModuleDescriptor] = &[
                $(
                    $crate::ModuleDescriptor {
                        name: stringify!($module),
                        base_contract: $crate::TRACKING_MODULE_BASE,
                        constructor: Some([<__facelink_ctor_ $module>]),
                    },
                )+
            ];

            static __FACELINK_REGISTRY: $crate::ModuleRegistry = $crate::ModuleRegistry {
                abi: $crate::FACELINK_ABI,
                modules: __FACELINK_MODULES,
            };

            #[no_mangle]
            #[allow(improper_ctypes_definitions)]
            pub extern "C" fn facelink_module_registry() -> &'static $crate::ModuleRegistry {
                &__FACELINK_REGISTRY
            }
        }
    };
}
