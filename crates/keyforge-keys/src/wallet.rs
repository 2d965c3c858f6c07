//! HD wallet generation: BIP-39 mnemonic, BIP-32 tree, Bitcoin and
//! Ethereum accounts
//!
//! Bitcoin follows BIP-84 (native segwit, `m/84'/0'/0'`), Ethereum the
//! conventional `m/44'/60'/0'/0/0`. Ethereum addresses are produced with
//! Keccak-256 proper, so they agree with the rest of the Ethereum
//! ecosystem; no EIP-55 checksum casing is applied.

use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use keyforge_core::{derive_key, domains, primitives, service_to_index};
use zeroize::Zeroizing;

use crate::KeygenError;

/// BIP-84 account path for Bitcoin (native segwit, mainnet)
pub const BIP84_ACCOUNT_PATH: &str = "m/84'/0'/0'";

/// Conventional Ethereum account path
pub const ETH_PATH: &str = "m/44'/60'/0'/0/0";

/// A Bitcoin account: extended keys at the account level plus the first
/// receive address.
#[derive(Debug, Clone)]
pub struct BitcoinAccount {
    /// Account-level extended private key (base58, `xprv…`)
    pub xpriv: String,
    /// Account-level extended public key (base58, `xpub…`)
    pub xpub: String,
    /// First receive address (`bc1…`, P2WPKH)
    pub address: String,
    /// Full path of `address`
    pub derivation_path: String,
}

/// An Ethereum account (address only; consumers derive signing keys on
/// demand from the mnemonic).
#[derive(Debug, Clone)]
pub struct EthereumAccount {
    /// `0x` + 40 lower-hex characters
    pub address: String,
    pub derivation_path: String,
}

/// A full HD wallet derived for one service.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// 24-word English BIP-39 mnemonic
    pub mnemonic: String,
    pub bitcoin: BitcoinAccount,
    pub ethereum: EthereumAccount,
}

/// Lightning identifiers for the payment wallet. Opaque: they identify a
/// node deterministically but make no claim of being a running node.
#[derive(Debug, Clone)]
pub struct Lightning {
    /// Hex of the compressed public key at the first receive slot
    pub node_id: String,
    /// Hex of a dedicated 32-byte derived seed
    pub seed: String,
}

/// The internal payment wallet: a Bitcoin account without a mnemonic
/// (its BIP-32 master comes straight from domain derivation) plus
/// Lightning identifiers.
#[derive(Debug, Clone)]
pub struct PaymentWallet {
    pub bitcoin: BitcoinAccount,
    pub lightning: Lightning,
}

/// Generate the HD wallet for `service` (or the default wallet at index 0).
///
/// 32 bytes of domain entropy become a 24-word mnemonic; the mnemonic's
/// 64-byte seed (empty BIP-39 passphrase) roots the BIP-32 tree. The
/// mnemonic is the user-facing recovery artefact, so it is part of the
/// deterministic contract.
pub fn generate(seed: &[u8; 64], service: Option<&str>) -> Result<Wallet, KeygenError> {
    let index = service.map(service_to_index).unwrap_or(0);
    let entropy = derive_key(seed, domains::WALLET_BIP39, index, 32)?;

    let mnemonic = bip39::Mnemonic::from_entropy_in(bip39::Language::English, &entropy)
        .map_err(|e| KeygenError::Derivation(e.to_string()))?;
    let bip39_seed = Zeroizing::new(mnemonic.to_seed(""));

    let secp = Secp256k1::new();
    let root = Xpriv::new_master(Network::Bitcoin, &*bip39_seed)
        .map_err(|e| KeygenError::Derivation(e.to_string()))?;

    let bitcoin = bitcoin_account(&secp, &root)?;
    let ethereum = ethereum_account(&secp, &root)?;

    Ok(Wallet {
        mnemonic: mnemonic.to_string(),
        bitcoin,
        ethereum,
    })
}

/// Generate the internal payment wallet.
///
/// No BIP-39 step here: 32 domain-derived bytes are used directly as the
/// BIP-32 master seed, so this wallet is recoverable from the passphrase
/// but has no mnemonic to write down.
pub fn generate_payment_wallet(seed: &[u8; 64]) -> Result<PaymentWallet, KeygenError> {
    let master_seed = derive_key(seed, domains::WALLET_PAYMENT, 0, 32)?;

    let secp = Secp256k1::new();
    let root = Xpriv::new_master(Network::Bitcoin, &master_seed)
        .map_err(|e| KeygenError::Derivation(e.to_string()))?;
    let bitcoin = bitcoin_account(&secp, &root)?;

    let leaf = derive_at(&secp, &root, "m/84'/0'/0'/0/0")?;
    let node_id = hex::encode(leaf.private_key.public_key(&secp).serialize());

    let lightning_seed = derive_key(seed, domains::WALLET_PAYMENT, 1, 32)?;

    Ok(PaymentWallet {
        bitcoin,
        lightning: Lightning {
            node_id,
            seed: hex::encode(&*lightning_seed),
        },
    })
}

fn derive_at(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    root: &Xpriv,
    path: &str,
) -> Result<Xpriv, KeygenError> {
    let path: DerivationPath = path
        .parse()
        .map_err(|e: bitcoin::bip32::Error| KeygenError::Derivation(e.to_string()))?;
    root.derive_priv(secp, &path)
        .map_err(|e| KeygenError::Derivation(e.to_string()))
}

fn bitcoin_account(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    root: &Xpriv,
) -> Result<BitcoinAccount, KeygenError> {
    let account = derive_at(secp, root, BIP84_ACCOUNT_PATH)?;
    let xpub = Xpub::from_priv(secp, &account);

    // First receive slot below the account: /0/0
    let leaf = derive_at(secp, &account, "m/0/0")?;
    let compressed = bitcoin::CompressedPublicKey(leaf.private_key.public_key(secp));
    let address = bitcoin::Address::p2wpkh(&compressed, Network::Bitcoin);

    Ok(BitcoinAccount {
        xpriv: account.to_string(),
        xpub: xpub.to_string(),
        address: address.to_string(),
        derivation_path: "m/84'/0'/0'/0/0".to_string(),
    })
}

fn ethereum_account(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    root: &Xpriv,
) -> Result<EthereumAccount, KeygenError> {
    let leaf = derive_at(secp, root, ETH_PATH)?;
    let uncompressed = leaf.private_key.public_key(secp).serialize_uncompressed();

    // Drop the 0x04 SEC1 tag, hash the 64-byte point, keep the last 20
    let digest = primitives::keccak256(&uncompressed[1..]);
    let address = format!("0x{}", hex::encode(&digest[12..]));

    Ok(EthereumAccount {
        address,
        derivation_path: ETH_PATH.to_string(),
    })
}
