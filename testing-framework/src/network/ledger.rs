// World state of the in-process network and the rules applied to it.
//
// The rules follow what the production network is observed to enforce for
// the commands the harness uses. A transaction either applies in full or
// not at all; callers apply it to a copy and keep the copy on success.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use thiserror::Error;

use multinode_common::{
    account::{AccountId, DomainId, RoleId},
    asset::{AccountAsset, Amount, Asset, AssetId},
    config::{ADMIN_ACCOUNT_ID, ADMIN_ROLE, DEFAULT_USER_ROLE, GENESIS_DOMAIN},
    crypto::PublicKey,
    error::AmountError,
    permission::{GrantablePermission, Permission},
    query::{Query, QueryResponse, SignedQuery},
    transaction::{Command, Transaction},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0}")]
    Stateless(String),

    #[error("Account {account} lacks permission {permission}")]
    NoPermission {
        account: AccountId,
        permission: String,
    },

    #[error("Account {0} does not exist")]
    NoSuchAccount(AccountId),

    #[error("Asset {0} does not exist")]
    NoSuchAsset(AssetId),

    #[error("Domain {0} does not exist")]
    NoSuchDomain(DomainId),

    #[error("Role {0} does not exist")]
    NoSuchRole(RoleId),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Account {account} holds {have} of {asset}, needs {need}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        have: Amount,
        need: Amount,
    },

    #[error("Amount {amount} exceeds precision {precision} of {asset}")]
    PrecisionMismatch {
        asset: AssetId,
        amount: Amount,
        precision: u8,
    },

    #[error("Key {key} is not a signatory of {account}")]
    NotSignatory { account: AccountId, key: PublicKey },

    #[error("{account} requires {quorum} signatures, got {got}")]
    QuorumNotMet {
        account: AccountId,
        quorum: u32,
        got: usize,
    },

    #[error("Invalid query signature")]
    InvalidSignature,

    #[error("Amount overflow")]
    Overflow,
}

impl LedgerError {
    /// Stable numeric code reported alongside a failed status.
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::Stateless(_) => 1,
            LedgerError::NoPermission { .. } => 2,
            LedgerError::NoSuchAccount(_) => 3,
            LedgerError::NoSuchAsset(_) => 4,
            LedgerError::NoSuchDomain(_) => 5,
            LedgerError::NoSuchRole(_) => 6,
            LedgerError::AlreadyExists(_) => 7,
            LedgerError::InsufficientBalance { .. } => 8,
            LedgerError::PrecisionMismatch { .. } => 9,
            LedgerError::NotSignatory { .. } => 10,
            LedgerError::QuorumNotMet { .. } => 11,
            LedgerError::InvalidSignature => 12,
            LedgerError::Overflow => 13,
        }
    }
}

fn no_permission(account: &AccountId, permission: impl ToString) -> LedgerError {
    LedgerError::NoPermission {
        account: account.clone(),
        permission: permission.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AccountState {
    pub signatories: BTreeSet<PublicKey>,
    pub quorum: u32,
    pub roles: BTreeSet<RoleId>,
    pub balances: BTreeMap<AssetId, Amount>,
    // Permissions this account granted to others over its own assets
    pub granted: HashSet<(AccountId, GrantablePermission)>,
}

impl AccountState {
    fn new(public_key: PublicKey, role: RoleId) -> Self {
        Self {
            signatories: BTreeSet::from([public_key]),
            quorum: 1,
            roles: BTreeSet::from([role]),
            balances: BTreeMap::new(),
            granted: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldState {
    roles: HashMap<RoleId, BTreeSet<Permission>>,
    domains: HashMap<DomainId, RoleId>,
    assets: HashMap<AssetId, Asset>,
    accounts: HashMap<AccountId, AccountState>,
}

impl WorldState {
    /// State after the genesis block: the `test` domain, the `admin` and
    /// `user` roles and the administrator account holding `admin_key`.
    pub fn genesis(admin_key: PublicKey) -> Result<Self, LedgerError> {
        let parse_err = |e: multinode_common::error::IdError| LedgerError::Stateless(e.to_string());
        let admin_role = RoleId::new(ADMIN_ROLE).map_err(parse_err)?;
        let user_role = RoleId::new(DEFAULT_USER_ROLE).map_err(parse_err)?;
        let domain = DomainId::new(GENESIS_DOMAIN).map_err(parse_err)?;
        let admin: AccountId = ADMIN_ACCOUNT_ID.parse().map_err(parse_err)?;

        let mut roles = HashMap::new();
        roles.insert(
            admin_role.clone(),
            Permission::all().iter().copied().collect(),
        );
        roles.insert(
            user_role.clone(),
            BTreeSet::from([
                Permission::CanReceive,
                Permission::CanTransfer,
                Permission::CanGetMyAccAst,
            ]),
        );

        let mut admin_state = AccountState::new(admin_key, admin_role);
        admin_state.roles.insert(user_role.clone());

        Ok(Self {
            roles,
            domains: HashMap::from([(domain, user_role)]),
            assets: HashMap::new(),
            accounts: HashMap::from([(admin, admin_state)]),
        })
    }

    fn account(&self, id: &AccountId) -> Result<&AccountState, LedgerError> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::NoSuchAccount(id.clone()))
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut AccountState, LedgerError> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::NoSuchAccount(id.clone()))
    }

    fn asset(&self, id: &AssetId) -> Result<&Asset, LedgerError> {
        self.assets
            .get(id)
            .ok_or_else(|| LedgerError::NoSuchAsset(id.clone()))
    }

    pub fn has_permission(&self, account: &AccountId, permission: Permission) -> bool {
        self.accounts.get(account).is_some_and(|state| {
            state.roles.iter().any(|role| {
                self.roles
                    .get(role)
                    .is_some_and(|permissions| permissions.contains(&permission))
            })
        })
    }

    fn require(&self, account: &AccountId, permission: Permission) -> Result<(), LedgerError> {
        if self.has_permission(account, permission) {
            Ok(())
        } else {
            Err(no_permission(account, permission))
        }
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains_key(role)
    }

    pub fn has_account(&self, account: &AccountId) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn balance(&self, account: &AccountId, asset: &AssetId) -> Option<Amount> {
        self.accounts
            .get(account)
            .and_then(|state| state.balances.get(asset))
            .copied()
    }

    fn check_signatories<'a>(
        &self,
        account: &AccountId,
        keys: impl Iterator<Item = &'a PublicKey>,
    ) -> Result<(), LedgerError> {
        let state = self.account(account)?;
        let mut got = 0;
        for key in keys {
            if !state.signatories.contains(key) {
                return Err(LedgerError::NotSignatory {
                    account: account.clone(),
                    key: *key,
                });
            }
            got += 1;
        }
        if got < state.quorum as usize {
            return Err(LedgerError::QuorumNotMet {
                account: account.clone(),
                quorum: state.quorum,
                got,
            });
        }
        Ok(())
    }

    /// Apply every command of `tx` in order. Stops at the first failure,
    /// leaving `self` partially modified.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let creator = tx.creator();
        self.check_signatories(creator, tx.signers())?;
        for command in &tx.payload.commands {
            self.apply_command(creator, command)?;
        }
        Ok(())
    }

    fn apply_command(&mut self, creator: &AccountId, command: &Command) -> Result<(), LedgerError> {
        match command {
            Command::CreateRole {
                role_name,
                permissions,
            } => {
                self.require(creator, Permission::CanCreateRole)?;
                // Nobody hands out more than they hold
                for permission in permissions {
                    self.require(creator, *permission)?;
                }
                if self.roles.contains_key(role_name) {
                    return Err(LedgerError::AlreadyExists(format!("Role {}", role_name)));
                }
                self.roles
                    .insert(role_name.clone(), permissions.iter().copied().collect());
            }
            Command::CreateDomain {
                domain_id,
                default_role,
            } => {
                self.require(creator, Permission::CanCreateDomain)?;
                if !self.roles.contains_key(default_role) {
                    return Err(LedgerError::NoSuchRole(default_role.clone()));
                }
                if self.domains.contains_key(domain_id) {
                    return Err(LedgerError::AlreadyExists(format!("Domain {}", domain_id)));
                }
                self.domains.insert(domain_id.clone(), default_role.clone());
            }
            Command::CreateAsset {
                asset_name,
                domain_id,
                precision,
            } => {
                self.require(creator, Permission::CanCreateAsset)?;
                if !self.domains.contains_key(domain_id) {
                    return Err(LedgerError::NoSuchDomain(domain_id.clone()));
                }
                let asset_id = AssetId::new(asset_name.clone(), domain_id.clone())
                    .map_err(|e| LedgerError::Stateless(e.to_string()))?;
                if self.assets.contains_key(&asset_id) {
                    return Err(LedgerError::AlreadyExists(format!("Asset {}", asset_id)));
                }
                self.assets.insert(
                    asset_id.clone(),
                    Asset {
                        asset_id,
                        domain_id: domain_id.clone(),
                        precision: *precision,
                    },
                );
            }
            Command::CreateAccount {
                account_name,
                domain_id,
                public_key,
            } => {
                self.require(creator, Permission::CanCreateAccount)?;
                let default_role = self
                    .domains
                    .get(domain_id)
                    .cloned()
                    .ok_or_else(|| LedgerError::NoSuchDomain(domain_id.clone()))?;
                let account_id = AccountId::new(account_name.clone(), domain_id.clone())
                    .map_err(|e| LedgerError::Stateless(e.to_string()))?;
                if self.accounts.contains_key(&account_id) {
                    return Err(LedgerError::AlreadyExists(format!("Account {}", account_id)));
                }
                self.accounts
                    .insert(account_id, AccountState::new(*public_key, default_role));
            }
            Command::AddAssetQuantity { asset_id, amount } => {
                self.require(creator, Permission::CanAddAssetQty)?;
                self.check_precision(asset_id, amount)?;
                self.credit(creator, asset_id, amount)?;
            }
            Command::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                amount,
                ..
            } => {
                if src_account_id == creator {
                    self.require(creator, Permission::CanTransfer)?;
                } else {
                    let grant = (creator.clone(), GrantablePermission::CanTransferMyAssets);
                    if !self.account(src_account_id)?.granted.contains(&grant) {
                        return Err(no_permission(
                            creator,
                            format!(
                                "{} over {}",
                                GrantablePermission::CanTransferMyAssets,
                                src_account_id
                            ),
                        ));
                    }
                }
                self.account(dest_account_id)?;
                self.require(dest_account_id, Permission::CanReceive)?;
                self.check_precision(asset_id, amount)?;
                self.debit(src_account_id, asset_id, amount)?;
                self.credit(dest_account_id, asset_id, amount)?;
            }
            Command::GrantPermission {
                account_id,
                permission,
            } => {
                self.require(creator, permission.required_to_grant())?;
                self.account(account_id)?;
                self.account_mut(creator)?
                    .granted
                    .insert((account_id.clone(), *permission));
            }
        }
        Ok(())
    }

    fn check_precision(&self, asset_id: &AssetId, amount: &Amount) -> Result<(), LedgerError> {
        let asset = self.asset(asset_id)?;
        if !amount.fits_precision(asset.precision) {
            return Err(LedgerError::PrecisionMismatch {
                asset: asset_id.clone(),
                amount: *amount,
                precision: asset.precision,
            });
        }
        Ok(())
    }

    fn credit(
        &mut self,
        account: &AccountId,
        asset_id: &AssetId,
        amount: &Amount,
    ) -> Result<(), LedgerError> {
        let balance = self
            .account_mut(account)?
            .balances
            .entry(asset_id.clone())
            .or_default();
        *balance = balance
            .checked_add(amount)
            .map_err(|_| LedgerError::Overflow)?;
        Ok(())
    }

    fn debit(
        &mut self,
        account: &AccountId,
        asset_id: &AssetId,
        amount: &Amount,
    ) -> Result<(), LedgerError> {
        let state = self.account_mut(account)?;
        let have = state.balances.get(asset_id).copied().unwrap_or_default();
        let remaining = have.checked_sub(amount).map_err(|e| match e {
            AmountError::Insufficient { .. } => LedgerError::InsufficientBalance {
                account: account.clone(),
                asset: asset_id.clone(),
                have,
                need: *amount,
            },
            _ => LedgerError::Overflow,
        })?;
        state.balances.insert(asset_id.clone(), remaining);
        Ok(())
    }

    /// Answer a signed query. Failures are reported in the response.
    pub fn query(&self, query: &SignedQuery) -> QueryResponse {
        match self.try_query(query) {
            Ok(response) => response,
            Err(e) => QueryResponse::Error {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }

    fn try_query(&self, query: &SignedQuery) -> Result<QueryResponse, LedgerError> {
        query.verify().map_err(|_| LedgerError::InvalidSignature)?;
        let creator = query.creator();
        self.check_signatories(creator, std::iter::once(&query.signature.public_key))?;

        match &query.payload.query {
            Query::GetAccountAssets { account_id } => {
                let allowed = self.has_permission(creator, Permission::CanGetAllAccAst)
                    || (account_id == creator
                        && self.has_permission(creator, Permission::CanGetMyAccAst));
                if !allowed {
                    return Err(no_permission(creator, Permission::CanGetAllAccAst));
                }

                let state = self.account(account_id)?;
                let assets = state
                    .balances
                    .iter()
                    .map(|(asset_id, balance)| AccountAsset {
                        asset_id: asset_id.clone(),
                        account_id: account_id.clone(),
                        balance: *balance,
                    })
                    .collect();
                Ok(QueryResponse::AccountAssets(assets))
            }
            Query::GetAssetInfo { asset_id } => {
                self.require(creator, Permission::CanReadAssets)?;
                Ok(QueryResponse::AssetInfo(self.asset(asset_id)?.clone()))
            }
        }
    }
}
