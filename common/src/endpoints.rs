//! Paths of the vendor cloud API and of the companion web service.

pub const NEST_MOBILE_STATUS_PATH: &str = "/v2/mobile/user.";
pub const NEST_PUT_PATH: &str = "/v2/put/";
pub const NEST_PROTOCOL_VERSION: &str = "1";

pub const NEST_BUCKET_SHARED: &str = "shared";
pub const NEST_BUCKET_DEVICE: &str = "device";
pub const NEST_BUCKET_STRUCTURE: &str = "structure";

pub const WEBAPP_GET_STATUS: &str = "get_status";
pub const WEBAPP_UPDATE_STATUS: &str = "update_status";
