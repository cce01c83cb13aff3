//! Lowering session configuration
//!
//! One [`LoweringOptions`] value is fixed for the lifetime of a lowering
//! session. It selects the target dialect and describes the deployment
//! environment that platform exclusions are evaluated against.

use std::fmt;

/// Target IR dialect emitted by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetDialect {
    /// Fixed-function layer records with embedded weight blobs
    #[default]
    Layers,
    /// General-purpose program operations with named constant operands
    Program,
}

impl TargetDialect {
    /// Short name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            TargetDialect::Layers => "layers",
            TargetDialect::Program => "program",
        }
    }
}

impl fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operating system of the deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    /// iOS device or simulator
    Ios,
    /// macOS
    MacOs,
    /// Linux
    Linux,
    /// Windows
    Windows,
    /// Anything else
    Other,
}

/// CPU architecture of the deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArch {
    /// x86_64
    X86_64,
    /// aarch64
    Aarch64,
    /// Anything else
    Other,
}

/// Deployment environment a lowered model will run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetEnvironment {
    /// Operating system
    pub os: TargetOs,
    /// CPU architecture
    pub arch: TargetArch,
    /// Version of the accelerator runtime
    pub runtime_version: u32,
}

impl TargetEnvironment {
    /// Runtime version assumed when none is configured
    pub const DEFAULT_RUNTIME_VERSION: u32 = 7;

    /// Environment of the compile target
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "ios" => TargetOs::Ios,
            "macos" => TargetOs::MacOs,
            "linux" => TargetOs::Linux,
            "windows" => TargetOs::Windows,
            _ => TargetOs::Other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => TargetArch::X86_64,
            "aarch64" => TargetArch::Aarch64,
            _ => TargetArch::Other,
        };
        Self {
            os,
            arch,
            runtime_version: Self::DEFAULT_RUNTIME_VERSION,
        }
    }

    /// Set runtime version
    pub fn with_runtime_version(mut self, version: u32) -> Self {
        self.runtime_version = version;
        self
    }
}

impl Default for TargetEnvironment {
    fn default() -> Self {
        Self::host()
    }
}

/// Options of a lowering session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Dialect to emit
    pub dialect: TargetDialect,
    /// Deployment environment for platform exclusions
    pub environment: TargetEnvironment,
    /// Whether the target accepts int64 tensors; int32 is used otherwise
    pub int64_supported: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            dialect: TargetDialect::default(),
            environment: TargetEnvironment::default(),
            int64_supported: true,
        }
    }
}

impl LoweringOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Options emitting the layer dialect
    pub fn layers() -> Self {
        Self::default().with_dialect(TargetDialect::Layers)
    }

    /// Options emitting the program dialect
    pub fn program() -> Self {
        Self::default().with_dialect(TargetDialect::Program)
    }

    /// Set dialect
    pub fn with_dialect(mut self, dialect: TargetDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set deployment environment
    pub fn with_environment(mut self, environment: TargetEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Set int64 support
    pub fn with_int64_supported(mut self, supported: bool) -> Self {
        self.int64_supported = supported;
        self
    }
}
