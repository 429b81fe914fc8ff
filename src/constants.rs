// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const WS_PATH: &str = "ws";
pub const HEALTH_PATH: &str = "health";
pub const RECOMMEND_PATH: &str = "recommend";

// Message gating
pub const DEFAULT_COOLDOWN_SECS: u64 = 5;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 84;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;
pub const DEFAULT_RATE_LIMIT_MAX_TRACKED: usize = 10_000;
pub const RATE_LIMIT_CLEANUP_INTERVAL_SECS: u64 = 60;

// Broadcast pipeline
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
// Frames a client may fall behind before it is dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

// Moderation
pub const DEFAULT_MODERATION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MODERATION_RETRIES: u32 = 1;
pub const DEFAULT_CENSOR_MARKER: &str = "[message restricted]";

// Audit log
pub const DEFAULT_AUDIT_DIR: &str = "logs";
pub const DEFAULT_AUDIT_TIMEZONE: &str = "America/New_York";
