//! Global constants used throughout the declkit codebase.
//!
//! This module contains size limits, timeouts, reserved names, and the
//! static tables that several modules share.

use std::time::Duration;

/// Default number of compiled engines a provider keeps cached.
pub const DEFAULT_CACHE_LIMIT: usize = 100;

/// Maximum number of characters in the `data` field of one stored record.
///
/// The appliance collection rejects entries longer than this, so every
/// encoded value is split into chunks no larger than this.
pub const MAX_RECORD_DATA: usize = 64512;

/// Timeout for one privileged shell command (60 seconds).
pub const SHELL_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Parameter name holding the generated render identifier.
pub const UUID_PARAM: &str = "uuid";

/// Parameter name a caller uses to override the unit (application) key.
pub const APPLICATION_NAME_PARAM: &str = "application_name";

/// Parameter name a template conventionally uses for its unit key.
pub const APP_NAME_PARAM: &str = "app_name";

/// Parameter name recorded in the metadata block for the grouping (tenant) key.
pub const TENANT_NAME_PARAM: &str = "tenant_name";

/// Parameter names that never appear in an inferred schema.
pub const RESERVED_PARAMS: &[&str] = &[UUID_PARAM, APPLICATION_NAME_PARAM];

/// Type tag (`"class"`) value identifying grouping nodes in a declaration.
pub const GROUPING_CLASS: &str = "Tenant";

/// Type tag (`"class"`) value identifying unit nodes in a declaration.
pub const UNIT_CLASS: &str = "Application";

/// Key of the metadata block injected into every unit node.
pub const CONSTANTS_KEY: &str = "constants";

/// Type tag of the injected metadata block.
pub const CONSTANTS_CLASS: &str = "Constants";

/// Extension of template files inside a template set directory.
pub const TEMPLATE_EXTENSION: &str = "mst";

/// Extension of schema files inside a template set directory.
pub const SCHEMA_EXTENSION: &str = "json";

/// Content hashes of the template sets shipped in `templates/`.
///
/// A persisted bundle whose hash appears here is reported as "supported".
pub const BUILTIN_SET_HASHES: &[(&str, &[&str])] = &[(
    "examples",
    &["sha256:6b4b329467cb266f8374d4d0fdcec193bdcf43d37b9c5083fd671035af6ad8cc"],
)];
