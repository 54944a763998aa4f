//! Runs the two-round MuSig2 protocol end to end with in-process signers.
//!
//! Set `RUST_LOG=debug` to see the protocol steps.

use clap::Parser;
use musig2::adaptor::AdaptorSecret;
use musig2::{
    AggregateNonce, Keypair, MusigError, NonceGen, PartialSignature, PublicNonce, SecretNonce,
    Session, SessionId, XOnlyPublicKey, adapt, extract_adaptor, key_agg, partial_sig_agg,
    partial_sig_verify, partial_sign, verify_signature,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MSG: &[u8; 32] = b"this_could_be_the_hash_of_a_msg!";

#[derive(Debug, Parser)]
#[command(about = "MuSig2 multi-signature demo")]
struct Args {
    /// Number of signers.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    signers: u16,

    /// Sign with an adaptor point, then adapt the pre-signature and extract the secret.
    #[arg(long)]
    adaptor: bool,
}

struct Signer {
    keypair: Keypair,
    pubkey: XOnlyPublicKey,
    secnonce: Option<SecretNonce>,
    pubnonce: Option<PublicNonce>,
    partial_sig: Option<PartialSignature>,
}

fn step<T>(label: &str, f: impl FnOnce() -> Result<T, MusigError>) -> Result<T, MusigError> {
    print!("{label:.<24}");
    let res = f();
    println!("{}", if res.is_ok() { "ok" } else { "FAILED" });
    res
}

fn check(label: &str, ok: bool) -> bool {
    println!("{label:.<24}{}", if ok { "ok" } else { "FAILED" });
    ok
}

fn run(args: &Args) -> Result<bool, MusigError> {
    let mut signers = step("Creating key pairs", || {
        Ok((0..args.signers)
            .map(|_| {
                let keypair = Keypair::random();
                let pubkey = keypair.x_only_public_key();
                Signer {
                    keypair,
                    pubkey,
                    secnonce: None,
                    pubnonce: None,
                    partial_sig: None,
                }
            })
            .collect::<Vec<_>>())
    })?;
    let pubkeys: Vec<_> = signers.iter().map(|s| s.pubkey.clone()).collect();

    let adaptor = if args.adaptor {
        Some(AdaptorSecret::random())
    } else {
        None
    };
    let adaptor_point = adaptor.as_ref().map(AdaptorSecret::adaptor_point);

    let (agg_pk, cache) = step("Combining public keys", || Ok(key_agg(&pubkeys)?))?;
    info!(%agg_pk, "aggregate public key");

    let (pre_sig, session) = step("Signing message", || {
        // Round 1: every signer draws a nonce pair from a fresh session id.
        for s in signers.iter_mut() {
            let (sec, pubn) = NonceGen::new(SessionId::random()?)
                .with_keypair(&s.keypair)
                .with_cache(&cache)
                .with_message(MSG)
                .generate()?;
            s.secnonce = Some(sec);
            s.pubnonce = Some(pubn);
        }
        let pubnonces: Vec<_> = signers.iter().filter_map(|s| s.pubnonce.clone()).collect();
        let aggnonce = AggregateNonce::sum(&pubnonces)?;
        let session = Session::new(&aggnonce, MSG, &cache, adaptor_point.as_ref())?;

        // Round 2: partial signatures.
        for s in signers.iter_mut() {
            if let Some(sec) = s.secnonce.take() {
                s.partial_sig = Some(partial_sign(sec, &s.keypair, &cache, &session)?);
            }
        }
        let partials: Vec<_> = signers
            .iter()
            .filter_map(|s| s.partial_sig.clone())
            .collect();
        Ok((partial_sig_agg(&session, &partials)?, session))
    })?;

    let mut all_partials_valid = true;
    for s in &signers {
        if let (Some(psig), Some(pubn)) = (&s.partial_sig, &s.pubnonce) {
            if !partial_sig_verify(psig, pubn, &s.pubkey, &cache, &session) {
                warn!(signer = %s.pubkey, "invalid partial signature");
                all_partials_valid = false;
            }
        }
    }
    check("Verifying partials", all_partials_valid);

    let sig = match &adaptor {
        Some(t) => step("Applying adaptor", || {
            Ok(adapt(&pre_sig, t.as_bytes(), session.nonce_parity())?)
        })?,
        None => pre_sig,
    };

    let valid = check("Verifying signature", verify_signature(&sig, MSG, &agg_pk));
    info!(signature = %hex::encode(sig), "final signature");

    let mut extracted_ok = true;
    if let Some(t) = &adaptor {
        let extracted = step("Extracting adaptor", || {
            Ok(extract_adaptor(&sig, &pre_sig, session.nonce_parity())?)
        })?;
        extracted_ok = check("Comparing adaptor", &extracted == t.as_bytes());
    }
    Ok(all_partials_valid && valid && extracted_ok)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
