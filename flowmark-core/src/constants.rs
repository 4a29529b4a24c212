use std::time::Duration;

/// Interval between two transaction-result polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on how long a single transaction is polled before it is reported as timed out.
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Number of attempts made to fetch a reference block before giving up on a transaction.
pub const DEFAULT_BLOCK_FETCH_ATTEMPTS: u32 = 3;

/// Fixed backoff between two reference block fetch attempts.
pub const DEFAULT_BLOCK_FETCH_BACKOFF: Duration = Duration::from_millis(500);

/// Pause between two admitted batches when dispatching with the batched strategy.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

pub const DEFAULT_GAS_LIMIT: u64 = 100;

/// Fixed-point values carry eight decimal places.
pub const FIX64_SCALE: u64 = 100_000_000;
pub const FIX64_DECIMALS: usize = 8;

/// Domain separation tag prepended to every signed transaction envelope.
pub const TRANSACTION_DOMAIN_TAG: &[u8] = b"FLOW-V0.0-transaction";

/// Address of the local ledger emulator, used when the network is `emulator`.
pub const EMULATOR_HOST: &str = "http://127.0.0.1:8888";
/// Public access nodes, used when the network is `testnet` or `mainnet`.
pub const TESTNET_HOST: &str = "https://rest-testnet.onflow.org";
pub const MAINNET_HOST: &str = "https://rest-mainnet.onflow.org";

/// Script used to add proposal keys to the benchmark account.
pub const ADD_KEYS_SCRIPT: &str = r#"
transaction(publicKey: String, numOfKeysToAdd: UInt32) {
    prepare(signer: AuthAccount) {
        let key = PublicKey(
            publicKey: publicKey.decodeHex(),
            signatureAlgorithm: SignatureAlgorithm.ECDSA_secp256k1
        )

        var counter: UInt32 = 0
        while counter < numOfKeysToAdd {
            counter = counter + 1
            signer.keys.add(
                publicKey: key,
                hashAlgorithm: HashAlgorithm.SHA3_256,
                weight: 0.0
            )
        }
    }
}
"#;
