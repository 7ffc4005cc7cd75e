//! Serialized command interface.
//!
//! Bindings hand the wallet a JSON [`Command`] and get a JSON [`Response`]
//! back. Each command maps to one public method; errors come back as
//! [`Response::Error`] with their [`ErrorKind`] so callers can branch on the
//! category without parsing messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_client::ClientOptions;
use tessera_store::{AccountAddress, AccountRecord, OutputFilter, OutputRecord, TransactionFilter, TransactionRecord};
use tessera_types::{AliasId, NftId, Output, OutputId, ProtocolParams, TokenId, TransactionId};
use tessera_utils::StatsSnapshot;
use tracing::debug;

use crate::account::Account;
use crate::balance::Balance;
use crate::config::SyncOptions;
use crate::error::{ErrorKind, WalletError};
use crate::secret::{MnemonicPhrase, Password};
use crate::transaction::{
    ClaimableOutput, CreateAliasParams, MintNativeTokenParams, MintNftParams, MintTokenTransaction,
    PreparedTransactionData, SendAmountParams, SendNativeTokensParams, SendNftParams,
    SignedTransactionData, TransactionOptions,
};
use crate::wallet::{AccountIdentifier, Wallet};

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", content = "payload", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    CreateAccount { alias: Option<String> },
    GetAccount(AccountIdentifier),
    GetAccountIndexes,
    GetAccounts,
    #[serde(rename_all = "camelCase")]
    CallAccount {
        account_id: AccountIdentifier,
        method: AccountMethod,
    },
    RemoveLatestAccount,
    #[serde(rename_all = "camelCase")]
    RecoverAccounts {
        account_start_index: u32,
        account_gap_limit: u32,
        address_gap_limit: u32,
        sync_options: Option<SyncOptions>,
    },
    Backup {
        destination: PathBuf,
        password: Password,
    },
    RestoreBackup {
        source: PathBuf,
        password: Password,
    },
    GenerateMnemonic,
    VerifyMnemonic(MnemonicPhrase),
    StoreMnemonic(MnemonicPhrase),
    SetVaultPassword(Password),
    ClearVaultPassword,
    IsVaultPasswordAvailable,
    #[serde(rename_all = "camelCase")]
    ChangeVaultPassword {
        current_password: Password,
        new_password: Password,
    },
    /// Seconds.
    SetVaultPasswordClearInterval(u64),
    SetClientOptions(ClientOptions),
    GetProtocolParameters,
    #[serde(rename_all = "camelCase")]
    StartBackgroundSync {
        options: Option<SyncOptions>,
        interval_in_milliseconds: Option<u64>,
    },
    StopBackgroundSync,
    IsBackgroundSyncing,
    SyncAll(Option<SyncOptions>),
    RequestFundsFromFaucet {
        url: Option<String>,
        address: String,
    },
    GetStats,
}

/// Operations on one account.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "camelCase")]
pub enum AccountMethod {
    Details,
    Addresses,
    GenerateAddresses {
        amount: u32,
        #[serde(default)]
        internal: bool,
    },
    GetBalance,
    Outputs(Option<OutputFilter>),
    UnspentOutputs,
    #[serde(rename_all = "camelCase")]
    GetOutput { output_id: OutputId },
    Transactions(Option<TransactionFilter>),
    PendingTransactions,
    IncomingTransactions,
    #[serde(rename_all = "camelCase")]
    GetTransaction { transaction_id: TransactionId },
    Sync(Option<SyncOptions>),
    SendAmount {
        params: Vec<SendAmountParams>,
        options: Option<TransactionOptions>,
    },
    SendNativeTokens {
        params: Vec<SendNativeTokensParams>,
        options: Option<TransactionOptions>,
    },
    SendNft {
        params: Vec<SendNftParams>,
        options: Option<TransactionOptions>,
    },
    SendOutputs {
        outputs: Vec<Output>,
        options: Option<TransactionOptions>,
    },
    PrepareTransaction {
        outputs: Vec<Output>,
        options: Option<TransactionOptions>,
    },
    SignTransactionEssence(PreparedTransactionData),
    SubmitAndStoreTransaction(SignedTransactionData),
    MintNfts {
        params: Vec<MintNftParams>,
        options: Option<TransactionOptions>,
    },
    CreateAliasOutput {
        params: Option<CreateAliasParams>,
        options: Option<TransactionOptions>,
    },
    MintNativeToken {
        params: MintNativeTokenParams,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    IncreaseNativeTokenSupply {
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    BurnNativeToken {
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    MeltNativeToken {
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    BurnNft {
        nft_id: NftId,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    DestroyAlias {
        alias_id: AliasId,
        options: Option<TransactionOptions>,
    },
    #[serde(rename_all = "camelCase")]
    DestroyFoundry {
        token_id: TokenId,
        options: Option<TransactionOptions>,
    },
    SweepChainOutputs {
        address: String,
        options: Option<TransactionOptions>,
    },
    MinimumRequiredStorageDeposit(Output),
    ClaimableOutputs,
    #[serde(rename_all = "camelCase")]
    ClaimOutputs {
        output_ids: Vec<OutputId>,
        options: Option<TransactionOptions>,
    },
    ConsolidateOutputs {
        #[serde(default)]
        force: bool,
        threshold: Option<usize>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Response {
    Account(AccountRecord),
    Accounts(Vec<AccountRecord>),
    AccountIndex(u32),
    AccountIndexes(Vec<u32>),
    Addresses(Vec<AccountAddress>),
    Balance(Balance),
    Balances(Vec<Balance>),
    Output(OutputRecord),
    Outputs(Vec<OutputRecord>),
    ClaimableOutputs(Vec<ClaimableOutput>),
    Transaction(TransactionRecord),
    /// `None` when consolidation had nothing to do.
    ConsolidationTransaction(Option<TransactionRecord>),
    Transactions(Vec<TransactionRecord>),
    MintedToken(MintTokenTransaction),
    PreparedTransaction(PreparedTransactionData),
    SignedTransaction(SignedTransactionData),
    GeneratedMnemonic(String),
    ProtocolParameters(ProtocolParams),
    FaucetResponse(String),
    Bool(bool),
    /// Base coin amount.
    Amount(u64),
    Stats(StatsSnapshot),
    Ok,
    Error { kind: ErrorKind, message: String },
}

impl From<WalletError> for Response {
    fn from(e: WalletError) -> Self {
        Response::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl Wallet {
    /// Run a command, reporting failures as [`Response::Error`].
    pub async fn execute(&self, command: Command) -> Response {
        debug!(?command, "executing command");
        match self.dispatch(command).await {
            Ok(response) => response,
            Err(e) => e.into(),
        }
    }

    /// Parse and run a JSON command.
    pub async fn execute_json(&self, command: &str) -> String {
        let response = match serde_json::from_str::<Command>(command) {
            Ok(command) => self.execute(command).await,
            Err(e) => WalletError::InvalidCommand(e.to_string()).into(),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","payload":{{"kind":"consistency","message":"{e}"}}}}"#)
        })
    }

    async fn dispatch(&self, command: Command) -> Result<Response, WalletError> {
        Ok(match command {
            Command::CreateAccount { alias } => {
                Response::Account(self.create_account(alias).await?.details().await)
            }
            Command::GetAccount(id) => Response::Account(self.get_account(id).await?.details().await),
            Command::GetAccountIndexes => Response::AccountIndexes(
                self.get_accounts().await.iter().map(Account::index).collect(),
            ),
            Command::GetAccounts => {
                let mut records = Vec::new();
                for account in self.get_accounts().await {
                    records.push(account.details().await);
                }
                Response::Accounts(records)
            }
            Command::CallAccount { account_id, method } => {
                let account = self.get_account(account_id).await?;
                call_account(&account, method).await?
            }
            Command::RemoveLatestAccount => Response::AccountIndex(self.remove_latest_account().await?),
            Command::RecoverAccounts {
                account_start_index,
                account_gap_limit,
                address_gap_limit,
                sync_options,
            } => {
                let accounts = self
                    .recover_accounts(account_start_index, account_gap_limit, address_gap_limit, sync_options)
                    .await?;
                let mut records = Vec::with_capacity(accounts.len());
                for account in accounts {
                    records.push(account.details().await);
                }
                Response::Accounts(records)
            }
            Command::Backup { destination, password } => {
                self.backup(&destination, &password).await?;
                Response::Ok
            }
            Command::RestoreBackup { source, password } => {
                self.restore_backup(&source, &password).await?;
                Response::Ok
            }
            Command::GenerateMnemonic => {
                Response::GeneratedMnemonic(self.generate_mnemonic()?.as_str().to_string())
            }
            Command::VerifyMnemonic(mnemonic) => {
                self.verify_mnemonic(&mnemonic)?;
                Response::Ok
            }
            Command::StoreMnemonic(mnemonic) => {
                self.store_mnemonic(mnemonic).await?;
                Response::Ok
            }
            Command::SetVaultPassword(password) => {
                self.set_vault_password(&password).await?;
                Response::Ok
            }
            Command::ClearVaultPassword => {
                self.clear_vault_password().await?;
                Response::Ok
            }
            Command::IsVaultPasswordAvailable => Response::Bool(self.is_vault_password_available().await?),
            Command::ChangeVaultPassword {
                current_password,
                new_password,
            } => {
                self.change_vault_password(&current_password, &new_password).await?;
                Response::Ok
            }
            Command::SetVaultPasswordClearInterval(secs) => {
                self.set_vault_password_clear_interval(Duration::from_secs(secs)).await?;
                Response::Ok
            }
            Command::SetClientOptions(options) => {
                self.set_client_options(options).await?;
                Response::Ok
            }
            Command::GetProtocolParameters => Response::ProtocolParameters(self.ctx().protocol().await?),
            Command::StartBackgroundSync {
                options,
                interval_in_milliseconds,
            } => {
                self.start_background_syncing(options, interval_in_milliseconds.map(Duration::from_millis))?;
                Response::Ok
            }
            Command::StopBackgroundSync => {
                self.stop_background_syncing().await?;
                Response::Ok
            }
            Command::IsBackgroundSyncing => Response::Bool(self.is_background_syncing()),
            Command::SyncAll(options) => Response::Balances(self.sync_all(options).await?),
            Command::RequestFundsFromFaucet { url, address } => Response::FaucetResponse(
                self.request_funds_from_faucet(url.as_deref(), &address).await?,
            ),
            Command::GetStats => Response::Stats(self.stats()),
        })
    }
}

async fn call_account(account: &Account, method: AccountMethod) -> Result<Response, WalletError> {
    Ok(match method {
        AccountMethod::Details => Response::Account(account.details().await),
        AccountMethod::Addresses => Response::Addresses(account.addresses().await),
        AccountMethod::GenerateAddresses { amount, internal } => {
            Response::Addresses(account.generate_addresses(amount, internal).await?)
        }
        AccountMethod::GetBalance => Response::Balance(account.balance().await?),
        AccountMethod::Outputs(filter) => {
            Response::Outputs(account.outputs(&filter.unwrap_or_else(OutputFilter::all))?)
        }
        AccountMethod::UnspentOutputs => Response::Outputs(account.unspent_outputs()?),
        AccountMethod::GetOutput { output_id } => Response::Output(account.get_output(&output_id)?),
        AccountMethod::Transactions(filter) => Response::Transactions(
            account.transactions(&filter.unwrap_or_else(TransactionFilter::all))?,
        ),
        AccountMethod::PendingTransactions => Response::Transactions(account.pending_transactions()?),
        AccountMethod::IncomingTransactions => Response::Transactions(account.incoming_transactions()?),
        AccountMethod::GetTransaction { transaction_id } => {
            Response::Transaction(account.get_transaction(&transaction_id)?)
        }
        AccountMethod::Sync(options) => Response::Balance(account.sync(options).await?),
        AccountMethod::SendAmount { params, options } => {
            Response::Transaction(account.send_amount(params, options).await?)
        }
        AccountMethod::SendNativeTokens { params, options } => {
            Response::Transaction(account.send_native_tokens(params, options).await?)
        }
        AccountMethod::SendNft { params, options } => {
            Response::Transaction(account.send_nft(params, options).await?)
        }
        AccountMethod::SendOutputs { outputs, options } => {
            Response::Transaction(account.send_outputs(outputs, options).await?)
        }
        AccountMethod::PrepareTransaction { outputs, options } => {
            Response::PreparedTransaction(account.prepare_transaction(outputs, options).await?)
        }
        AccountMethod::SignTransactionEssence(prepared) => {
            Response::SignedTransaction(account.sign_transaction_essence(&prepared).await?)
        }
        AccountMethod::SubmitAndStoreTransaction(signed) => {
            Response::Transaction(account.submit_and_store_transaction(signed).await?)
        }
        AccountMethod::MintNfts { params, options } => {
            Response::Transaction(account.mint_nfts(params, options).await?)
        }
        AccountMethod::CreateAliasOutput { params, options } => {
            Response::Transaction(account.create_alias_output(params, options).await?)
        }
        AccountMethod::MintNativeToken { params, options } => {
            Response::MintedToken(account.mint_native_token(params, options).await?)
        }
        AccountMethod::IncreaseNativeTokenSupply {
            token_id,
            amount,
            options,
        } => Response::MintedToken(
            account
                .increase_native_token_supply(token_id, amount, options)
                .await?,
        ),
        AccountMethod::BurnNativeToken {
            token_id,
            amount,
            options,
        } => Response::Transaction(account.burn_native_token(token_id, amount, options).await?),
        AccountMethod::MeltNativeToken {
            token_id,
            amount,
            options,
        } => Response::Transaction(account.melt_native_token(token_id, amount, options).await?),
        AccountMethod::BurnNft { nft_id, options } => {
            Response::Transaction(account.burn_nft(nft_id, options).await?)
        }
        AccountMethod::DestroyAlias { alias_id, options } => {
            Response::Transaction(account.destroy_alias(alias_id, options).await?)
        }
        AccountMethod::DestroyFoundry { token_id, options } => {
            Response::Transaction(account.destroy_foundry(token_id, options).await?)
        }
        AccountMethod::SweepChainOutputs { address, options } => {
            Response::Transaction(account.sweep_chain_outputs(&address, options).await?)
        }
        AccountMethod::MinimumRequiredStorageDeposit(output) => {
            Response::Amount(account.minimum_required_storage_deposit(&output).await?)
        }
        AccountMethod::ClaimableOutputs => Response::ClaimableOutputs(account.claimable_outputs().await?),
        AccountMethod::ClaimOutputs { output_ids, options } => {
            Response::Transaction(account.claim_outputs(output_ids, options).await?)
        }
        AccountMethod::ConsolidateOutputs { force, threshold } => {
            Response::ConsolidationTransaction(account.consolidate_outputs(force, threshold).await?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_command() {
        let command: Command =
            serde_json::from_str(r#"{"cmd":"createAccount","payload":{"alias":"savings"}}"#).unwrap();
        assert!(matches!(command, Command::CreateAccount { alias: Some(a) } if a == "savings"));
    }

    #[test]
    fn parses_nested_account_method() {
        let command: Command = serde_json::from_str(
            r#"{"cmd":"callAccount","payload":{"accountId":0,"method":{"name":"generateAddresses","data":{"amount":2}}}}"#,
        )
        .unwrap();
        match command {
            Command::CallAccount { account_id, method } => {
                assert_eq!(account_id, AccountIdentifier::Index(0));
                assert!(matches!(
                    method,
                    AccountMethod::GenerateAddresses {
                        amount: 2,
                        internal: false
                    }
                ));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn account_alias_identifier() {
        let command: Command = serde_json::from_str(
            r#"{"cmd":"callAccount","payload":{"accountId":"main","method":{"name":"getBalance"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            command,
            Command::CallAccount { account_id: AccountIdentifier::Alias(a), method: AccountMethod::GetBalance } if a == "main"
        ));
    }

    #[test]
    fn sweep_options_default_to_none() {
        let command: Command = serde_json::from_str(
            r#"{"cmd":"callAccount","payload":{"accountId":0,"method":{"name":"sweepChainOutputs","data":{"address":"tst1alias"}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            command,
            Command::CallAccount {
                method: AccountMethod::SweepChainOutputs { address, options: None },
                ..
            } if address == "tst1alias"
        ));
    }

    #[test]
    fn password_is_not_echoed_in_debug() {
        let command: Command =
            serde_json::from_str(r#"{"cmd":"setVaultPassword","payload":"hunter2"}"#).unwrap();
        assert!(!format!("{command:?}").contains("hunter2"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"cmd":"selfDestruct"}"#).is_err());
    }

    #[test]
    fn error_response_carries_kind() {
        let response: Response = WalletError::InsufficientFunds {
            needed: 10,
            available: 0,
        }
        .into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["kind"], "input");
    }

    #[test]
    fn unit_response_serializes_tag_only() {
        let json = serde_json::to_value(&Response::Ok).unwrap();
        assert_eq!(json["type"], "ok");
    }
}
