#![forbid(unsafe_code)]

//! eDataSig CLI: inspect, sign and verify eData documents.

use clap::{ArgGroup, Parser, Subcommand};
use edatasig::config::SchemaSource;
use edatasig::workflow::{self, VerifyInput};
use edatasig_core::Error;
use edatasig_dsig::{VerificationKey, VerificationMode};
use edatasig_keys::{loader, DirectoryStore, DsaCertificate, PassphrasePolicy};
use edatasig_schema::Schema;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "edatasig",
    about = "eDataSig: digital signatures for ASTM eData XML documents",
    version
)]
struct Cli {
    /// eData schema (default: $EDATA_SCHEMA, then eData.xsd beside the
    /// executable, then eData.xsd in $EDATA_DATA_DIR)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a document: validate it, report its signature and verify it
    Inspect {
        /// Input eData file
        file: PathBuf,

        /// Certificate to verify a DSA signature with (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Certificate store directory (trusted anchors in trusted/)
        #[arg(long = "cert-dir")]
        cert_dir: Option<PathBuf>,

        /// Password for an HMAC-SHA1 signature
        #[arg(long, env = "EDATA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign a document with a DSA private key
    SignDsa {
        /// Input eData file
        file: PathBuf,

        /// DSA private key (PKCS#8, PEM or DER)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sign a document with HMAC-SHA1 over a password
    SignHmac {
        /// Input eData file
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Password (read from stdin when absent)
        #[arg(long, env = "EDATA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Verify the signature of a document
    #[command(group(
        ArgGroup::new("source")
            .required(true)
            .args(["public_key", "cert", "password", "embedded"])
    ))]
    Verify {
        /// Input eData file
        file: PathBuf,

        /// DSA public key (SPKI, PEM or DER)
        #[arg(long = "public-key")]
        public_key: Option<PathBuf>,

        /// X.509 certificate carrying a DSA public key (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Password for an HMAC-SHA1 signature
        #[arg(long)]
        password: Option<String>,

        /// Use the public key embedded in the signature
        #[arg(long)]
        embedded: bool,
    },

    /// List supported algorithms and key formats
    Info,
}

fn main() {
    let cli = Cli::parse();
    edatasig::logging::init(cli.verbose);

    let schema = cli.schema.as_deref();
    let result = match cli.command {
        Commands::Inspect {
            file,
            cert,
            cert_dir,
            password,
        } => cmd_inspect(schema, &file, cert, cert_dir, password),

        Commands::SignDsa { file, key, output } => cmd_sign_dsa(schema, &file, &key, &output),

        Commands::SignHmac {
            file,
            output,
            password,
        } => cmd_sign_hmac(schema, &file, &output, password),

        Commands::Verify {
            file,
            public_key,
            cert,
            password,
            embedded: _,
        } => cmd_verify(schema, &file, public_key, cert, password),

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_schema(explicit: Option<&Path>) -> Result<Schema, Error> {
    SchemaSource::resolve(explicit)?.load()
}

fn cmd_inspect(
    schema: Option<&Path>,
    file: &Path,
    cert: Option<PathBuf>,
    cert_dir: Option<PathBuf>,
    password: Option<String>,
) -> Result<(), Error> {
    let schema = load_schema(schema)?;
    let store = cert_dir.map(DirectoryStore::new);
    let input = VerifyInput {
        certificate: cert.as_deref().map(DsaCertificate::load).transpose()?,
        store: store.as_ref().map(|s| s as &dyn edatasig_keys::CertificateStore),
        password,
    };
    let report = workflow::inspect(file, &schema, &input);
    for line in &report.lines {
        println!("{line}");
    }
    Ok(())
}

fn cmd_sign_dsa(schema: Option<&Path>, file: &Path, key: &Path, output: &Path) -> Result<(), Error> {
    let key = loader::load_key_file(key)?;
    let signing_key = key
        .dsa_private_key()
        .ok_or_else(|| Error::Key("the key file does not hold a DSA private key".into()))?;
    let schema = load_schema(schema)?;
    let doc = workflow::load_validated(file, &schema)?;
    edatasig_dsig::sign_dsa(&doc, signing_key, output)?;
    println!("Signing and saving were successful.");
    Ok(())
}

fn cmd_sign_hmac(
    schema: Option<&Path>,
    file: &Path,
    output: &Path,
    password: Option<String>,
) -> Result<(), Error> {
    let policy = PassphrasePolicy::default();
    let secret = match password {
        Some(p) => policy.derive(&p, None)?,
        None => {
            let first = read_password("Enter password:")?;
            policy.check(&first, None)?;
            let second = read_password("Re-enter password:")?;
            policy.derive(&first, Some(&second))?
        }
    };
    let schema = load_schema(schema)?;
    let doc = workflow::load_validated(file, &schema)?;
    edatasig_dsig::sign_hmac(&doc, &secret, output)?;
    println!("Signing and saving were successful.");
    Ok(())
}

fn cmd_verify(
    schema: Option<&Path>,
    file: &Path,
    public_key: Option<PathBuf>,
    cert: Option<PathBuf>,
    password: Option<String>,
) -> Result<(), Error> {
    let key = if let Some(path) = public_key {
        VerificationKey::PublicKey(loader::load_key_file(&path)?.data.public)
    } else if let Some(path) = cert {
        VerificationKey::PublicKey(DsaCertificate::load(&path)?.public_key().clone())
    } else if let Some(password) = password {
        VerificationKey::SharedSecret(edatasig_keys::passphrase::key_bytes(&password))
    } else {
        VerificationKey::Embedded
    };

    let schema = load_schema(schema)?;
    let doc = workflow::load_validated(file, &schema)?;
    let result = edatasig_dsig::verify(&doc, &key);
    match (result.valid, result.mode) {
        (true, VerificationMode::Embedded) => {
            println!("OK ({})", workflow::EMBEDDED_VALID);
            Ok(())
        }
        (true, _) => {
            println!("OK");
            Ok(())
        }
        (false, _) => {
            eprintln!(
                "INVALID: {}",
                result.diagnostic.as_deref().unwrap_or("the signature does not verify")
            );
            process::exit(1);
        }
    }
}

fn cmd_info() -> Result<(), Error> {
    println!("eDataSig: digital signatures for ASTM eData XML documents");
    println!();
    println!("Signature location:");
    println!("  /ASTMeDataXchange/FileInformation/ds:Signature (enveloped, Reference URI=\"\")");
    println!();
    println!("Supported signature algorithms:");
    println!("  DSA-SHA1, HMAC-SHA1");
    println!();
    println!("Supported digest algorithms:");
    println!("  SHA-1 (SHA-256 on verification)");
    println!();
    println!("Supported canonicalization:");
    println!("  C14N 1.0 (±comments)");
    println!();
    println!("Supported key formats:");
    println!("  PEM, DER (DSA PKCS#8, SPKI, X.509), password (HMAC)");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_password(prompt: &str) -> Result<String, Error> {
    eprint!("{prompt} ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_owned())
}
