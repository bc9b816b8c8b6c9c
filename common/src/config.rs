// Well-known identities and defaults of the network under test.
//
// A freshly started network ships with a genesis block that registers the
// `test` domain, the `admin` and `user` roles, and the `admin@test`
// account. Everything else is created by the harness itself.

pub const VERSION: &str = env!("BUILD_VERSION");

// Number of peers in the reference deployment
pub const DEFAULT_NODE_COUNT: usize = 4;

// Genesis domain and administrator
pub const GENESIS_DOMAIN: &str = "test";
pub const ADMIN_ACCOUNT_ID: &str = "admin@test";
pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_USER_ROLE: &str = "user";

// Namespace created by the harness for its own accounts and assets
pub const HARNESS_DOMAIN: &str = "probe";
pub const HARNESS_ROLE: &str = "basic_user";
pub const HARNESS_ASSET_NAME: &str = "coin";
pub const HARNESS_ASSET_PRECISION: u8 = 2;

// Balance every user holds at the start of a scenario
pub const BASELINE_BALANCE: &str = "100";
// Supply the administrator mints for itself during bootstrap
pub const ADMIN_MINT: &str = "1000.00";

// Identifiers are limited to this many characters
pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_DOMAIN_LENGTH: usize = 255;

// Amounts never carry more fractional digits than this
pub const MAX_PRECISION: u8 = 18;

// Quorum attached to transactions unless told otherwise
pub const DEFAULT_QUORUM: u32 = 1;
