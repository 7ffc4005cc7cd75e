//! The base coin balance always splits into available and locked, whatever
//! the funding and whatever is in flight.

mod common;

use common::{first_address, harness, stranger};
use proptest::prelude::*;
use tessera_wallet::{Balance, SendAmountParams};

fn assert_split(balance: &Balance) -> Result<(), TestCaseError> {
    prop_assert_eq!(
        balance.base_coin.total,
        balance.base_coin.available + balance.base_coin.locked
    );
    Ok(())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn total_is_available_plus_locked(
        amounts in prop::collection::vec(100_000u64..5_000_000, 1..6),
        send in 100_000u64..2_000_000,
    ) {
        runtime().block_on(async {
            let h = harness().await;
            let account = h.wallet.create_account(None).await.unwrap();
            let address = first_address(&account).await;
            for amount in &amounts {
                h.node.fund(address, *amount);
            }
            let funded: u64 = amounts.iter().sum();

            let balance = account.sync(None).await.unwrap();
            prop_assert_eq!(balance.base_coin.total, funded);
            prop_assert_eq!(balance.base_coin.available, funded);
            assert_split(&balance)?;

            let sent = account
                .send_amount(vec![SendAmountParams { address: stranger(9), amount: send }], None)
                .await;
            let balance = account.balance().await.unwrap();
            assert_split(&balance)?;
            prop_assert_eq!(balance.base_coin.total, funded);
            if sent.is_err() {
                prop_assert_eq!(balance.base_coin.available, funded);
                return Ok(());
            }

            let tx = sent.unwrap();
            h.node.confirm(&tx.transaction_id);
            let balance = account.sync(None).await.unwrap();
            assert_split(&balance)?;
            prop_assert_eq!(balance.base_coin.total, funded - send);
            prop_assert_eq!(balance.base_coin.locked, 0);
            Ok(())
        })?;
    }
}
