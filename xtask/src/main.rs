use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use hit_counter_core::stack::api::is_api_base_url;
use hit_counter_core::stack::function::{CodeAsset, ASSET_BUCKET, CUSTOM_RUNTIME_HANDLER};
use hit_counter_core::stack::hit_counter::{
    synthesize_hit_counter, HitCounterStackProps, DEFAULT_STACK_NAME,
};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const FUNCTION_BINARY: &str = "increment_counter";
const DEFAULT_BUNDLE: &str = "dist/increment_counter.zip";
const BOOTSTRAP_ENTRY: &str = CUSTOM_RUNTIME_HANDLER;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the hit counter workspace",
    long_about = "A unified CLI for packaging the counter function, synthesizing\n\
                  the stack template, and running CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and zip the counter function as a custom-runtime bundle
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Synthesize the stack into a CloudFormation template
    Synth {
        /// Stack name, also used for the template file name
        #[arg(long, env = "HIT_COUNTER_STACK_NAME", default_value = DEFAULT_STACK_NAME)]
        stack_name: String,
        /// Code bundle produced by `package`
        #[arg(long, default_value = DEFAULT_BUNDLE)]
        bundle: PathBuf,
        /// API stage the deployment is published to
        #[arg(long, default_value = "prod")]
        stage: String,
        /// Directory receiving the template
        #[arg(long, default_value = "cdk.out")]
        out_dir: PathBuf,
    },
    /// Check a deployed ApiUrl stack output
    VerifyUrl {
        /// Value of the ApiUrl output
        url: String,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_counter_function(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build counter function binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        "hit_counter_lambda",
        "--target",
        target,
        "--bin",
        FUNCTION_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package bootstrap bundle");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(FUNCTION_BINARY);
    let bundle = Path::new(DEFAULT_BUNDLE);
    let bytes = match write_bootstrap_bundle(&binary_path, bundle) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error: failed to package '{}': {error}", binary_path.display());
            exit(1);
        }
    };

    eprintln!(
        "\nPackaged artifact:\n- {} (asset {})",
        bundle.display(),
        CodeAsset::from_bundle(&bytes).hash()
    );
}

fn ensure_rust_target_installed(target: &str) {
    let installed = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) if output.status.success() => output.stdout,
        _ => {
            eprintln!("warning: could not list installed rust targets; skipping target preflight");
            return;
        }
    };

    if !String::from_utf8_lossy(&installed)
        .lines()
        .any(|line| line.trim() == target)
    {
        eprintln!("error: rust target `{target}` is missing; run `rustup target add {target}`");
        exit(1);
    }
}

/// Zips the binary as the custom runtime's `bootstrap` entry and returns the
/// bundle bytes.
fn write_bootstrap_bundle(binary_path: &Path, bundle: &Path) -> io::Result<Vec<u8>> {
    let binary = fs::read(binary_path)?;
    if let Some(dist_dir) = bundle.parent() {
        fs::create_dir_all(dist_dir)?;
    }

    let mut zip = ZipWriter::new(io::Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(BOOTSTRAP_ENTRY, options)?;
    zip.write_all(&binary)?;
    let bytes = zip.finish()?.into_inner();

    fs::write(bundle, &bytes)?;
    Ok(bytes)
}

fn synth(stack_name: String, bundle: &Path, stage: String, out_dir: &Path) {
    step("Hash code bundle");
    let bytes = fs::read(bundle).unwrap_or_else(|error| {
        panic!(
            "failed to read code bundle '{}' ({error}); run `cargo run -p xtask -- package` first",
            bundle.display()
        )
    });
    let code = CodeAsset::from_bundle(&bytes);

    step("Synthesize stack template");
    let props = HitCounterStackProps {
        stack_name: stack_name.clone(),
        code: code.clone(),
        stage_name: stage,
    };
    let template = match synthesize_hit_counter(&props) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error: stack '{stack_name}' failed to synthesize: {error}");
            exit(1);
        }
    };
    let body = template
        .to_pretty_json()
        .expect("template should serialize");

    fs::create_dir_all(out_dir).expect("failed to create template output directory");
    let template_path = out_dir.join(format!("{stack_name}.template.json"));
    fs::write(&template_path, body).expect("failed to write template");

    eprintln!(
        "\nSynthesized {} resources:\n- {}\nStage the bundle before deploying:\n- {} -> s3://{}/{}",
        template.resources.len(),
        template_path.display(),
        bundle.display(),
        ASSET_BUCKET,
        code.s3_key()
    );
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test hit_counter_core");
    run_cargo(&["test", "-p", "hit_counter_core"]);

    step("Test hit_counter_lambda");
    run_cargo(&["test", "-p", "hit_counter_lambda"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => {
            package_counter_function(&target, profile);
        }
        Commands::Synth {
            stack_name,
            bundle,
            stage,
            out_dir,
        } => {
            synth(stack_name, &bundle, stage, &out_dir);
        }
        Commands::VerifyUrl { url } => {
            if is_api_base_url(url.trim()) {
                eprintln!("ApiUrl looks like a deployed endpoint: {}", url.trim());
            } else {
                eprintln!(
                    "error: '{url}' is not of the form https://<id>.execute-api.<region>.amazonaws.com/<stage>/"
                );
                exit(1);
            }
        }
        Commands::Ci => {
            ci_check();
            eprintln!("\nCI job passed.");
        }
    }
}
