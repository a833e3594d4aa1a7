use std::time::Duration;

// indices
pub const ACCOUNTS_INDEX: &str = "accounts";
pub const VALUES_INDEX: &str = "values";
/// Lifecycle policy stored next to every dated accounts index
pub const ACCOUNTS_POLICY_NAME: &str = "accounts_policy";
pub const DELEGATORS_INDEX: &str = "delegators";
pub const ENERGY_SNAPSHOT_PREFIX: &str = "energy-snapshot";

// chain
pub const METACHAIN_SHARD_ID: u32 = u32::MAX;
pub const NUM_SHARDS: u32 = 3;
pub const ADDRESS_HRP: &str = "erd";
pub const ADDRESS_LEN: usize = 32;

// balances
pub const DENOMINATION: i32 = 18;
pub const FLOAT_BALANCE_DECIMALS: i32 = 10;

// api paths
pub const PATH_NETWORK_STATUS_META: &str = "/network/status/4294967295";
pub const PATH_VALIDATORS_STAKE: &str = "/network/direct-staked-info";
pub const PATH_DELEGATORS_STAKE: &str = "/network/delegated-info";
pub const PATH_VM_VALUES: &str = "/vm-values/query";

/// Storage key/value pairs of an account, `{}` is the bech32 address
pub fn path_account_keys(address: &str) -> String {
    format!("/address/{address}/keys")
}

// contract functions
pub const FN_FULL_ACTIVE_LIST: &str = "getFullActiveList";
pub const FN_FULL_WAITING_LIST: &str = "getFullWaitingList";
pub const FN_USER_STAKE_BY_TYPE: &str = "getUserStakeByType";
pub const FN_UNSTAKED_TOKENS_LIST: &str = "getUnStakedTokensList";
pub const FN_LKMEX_SNAPSHOT: &str = "getSnapshot";

// fan-out
pub const MAX_PARALLEL_REQUESTS: usize = 40;

// search engine
pub const SCROLL_PAGE_SIZE: usize = 9000;
pub const SCROLL_FIRST_KEEP_ALIVE: Duration = Duration::from_secs(10 * 60);
pub const SCROLL_NEXT_KEEP_ALIVE: Duration = Duration::from_secs(2 * 60);
pub const BULK_BUFFER_THRESHOLD: usize = 800_000;
pub const MULTI_GET_CHUNK: usize = 2000;
pub const BULK_ERRORS_REPORTED: usize = 5;

// cloner
pub const CLONE_BACKOFF_START: Duration = Duration::from_secs(10);
pub const CLONE_BACKOFF_MAX: Duration = Duration::from_secs(5 * 60);
pub const CLONE_MAX_TRIES: u32 = 10;

// rest client
pub const REST_MAX_RETRIES: u32 = 10;
pub const REST_DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// object storage snapshots
pub const EGLD_BALANCE_FILE_PREFIX: &str = "egld_balance";
pub const LEGACY_DELEGATION_STATE_FILE_PREFIX: &str = "legacy_delegation_state";
pub const DIRECT_STAKE_FILE_PREFIX: &str = "direct_stake";
pub const DELEGATED_INFO_FILE_PREFIX: &str = "delegated_info";
pub const LEGACY_DELEGATION_SHARD_ID: u32 = 2;
/// Staking providers did not exist before this epoch
pub const STAKING_PROVIDERS_ACTIVATION_EPOCH: u32 = 239;
