use anyhow::{bail, Context, Result};
use audit_core::{
    AccessControlEntry, AuditArtifact, AuditConfig, AuditReportBuilder, InMemoryRegistry,
    InMemoryTree, NodeId, PrincipalRegistry,
};
use audit_kernel::{AuditJob, FileSystemPublisher, LocalScheduler, WorkState};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEMO_FANOUT: usize = 8;
const DEMO_GROUPS: [&str; 3] = ["administrators", "members", "auditors"];
const DEMO_USERS: [&str; 3] = ["alice", "bob", "carol"];
const DEMO_PERMISSIONS: [&str; 3] = ["Read", "ReadWrite", "Everything"];

fn cli() -> Command {
    Command::new("audit-kernel")
        .version(audit_kernel::VERSION)
        .about("Bounded ACL audit reports")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("demo")
                .about("Audit a synthetic document tree through the scheduler")
                .arg(
                    Arg::new("nodes")
                        .long("nodes")
                        .default_value("1000")
                        .value_parser(value_parser!(usize))
                        .help("Number of documents in the tree"),
                )
                .arg(
                    Arg::new("entries")
                        .long("entries")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("ACL entries per document"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory receiving the published artifact"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Processing budget (overrides the configuration)"),
                )
                .arg(
                    Arg::new("max-rows")
                        .long("max-rows")
                        .value_parser(value_parser!(usize))
                        .help("Rows per sheet (overrides the configuration)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Print the status marker of an artifact")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Artifact file"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

/// Balanced tree of `nodes` documents with `entries` ACL entries each
fn demo_tree(nodes: usize, entries: usize) -> Result<(InMemoryTree, NodeId)> {
    let principals: Vec<&str> = DEMO_GROUPS.iter().chain(DEMO_USERS.iter()).copied().collect();
    let acl = |seed: usize| -> Vec<AccessControlEntry> {
        (0..entries)
            .map(|i| {
                let principal = principals[(seed + i) % principals.len()];
                let permission = DEMO_PERMISSIONS[(seed + i) % DEMO_PERMISSIONS.len()];
                if (seed + i) % 11 == 10 {
                    AccessControlEntry::deny(principal, permission)
                } else {
                    AccessControlEntry::grant(principal, permission)
                }
            })
            .collect()
    };

    let mut tree = InMemoryTree::new();
    let root = tree.add_root("/default-domain");
    tree.set_acl(root, acl(0))?;

    let mut parents = VecDeque::from([root]);
    let mut created = 1;
    while created < nodes {
        let Some(parent) = parents.pop_front() else {
            break;
        };
        for _ in 0..DEMO_FANOUT.min(nodes - created) {
            let child = tree.add_child(parent, format!("doc-{created}"))?;
            tree.set_acl(child, acl(created))?;
            parents.push_back(child);
            created += 1;
        }
    }
    Ok((tree, root))
}

async fn run_demo(args: &ArgMatches) -> Result<()> {
    let nodes = args.get_one::<usize>("nodes").copied().unwrap_or(1000);
    let entries = args.get_one::<usize>("entries").copied().unwrap_or(3);
    let Some(out) = args.get_one::<PathBuf>("out") else {
        bail!("--out is required");
    };

    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => AuditConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AuditConfig::new(),
    };
    if let Some(secs) = args.get_one::<u64>("timeout-secs") {
        config.job.timeout_secs = *secs;
    }
    if let Some(rows) = args.get_one::<usize>("max-rows") {
        config.sheet.max_rows = *rows;
    }
    config.validate().context("invalid configuration")?;

    let (tree, root) = demo_tree(nodes, entries)?;
    let registry: Arc<dyn PrincipalRegistry> = Arc::new(
        InMemoryRegistry::new()
            .with_groups(DEMO_GROUPS)
            .with_users(DEMO_USERS),
    );
    let filter = config.filter.build(Some(registry))?;
    let builder = AuditReportBuilder::new(Arc::new(tree), Arc::new(config.layout.clone()), filter)?
        .with_grid(config.grid()?)?;

    let scheduler = LocalScheduler::from_config(&config.scheduler)?;
    let work_dir = std::env::temp_dir();
    let job = AuditJob::new(
        "demo",
        "in-memory",
        root,
        work_dir.join(format!("acl-audit-{}.json", uuid::Uuid::new_v4())),
        builder,
        Arc::new(FileSystemPublisher::new(out)),
    )
    .with_config(&config.job);
    let destination = out.join(
        job.destination()
            .file_name()
            .context("artifact path has no file name")?,
    );

    let handle = scheduler.submit(Arc::new(job))?;
    let state = handle.wait().await;

    println!("Job {} ({}): {state}", handle.name(), handle.id());
    match state {
        WorkState::Completed => {
            let status = AuditArtifact::read_status(&destination)?;
            println!("Artifact: {}", destination.display());
            println!("Status:   {status}");
            Ok(())
        }
        _ => match handle.failure() {
            Some(error) => bail!("job {state}: {error}"),
            None => bail!("job {state}"),
        },
    }
}

fn run_status(args: &ArgMatches) -> Result<()> {
    let Some(file) = args.get_one::<PathBuf>("file") else {
        bail!("artifact file is required");
    };
    let status = AuditArtifact::read_status(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    println!("{status}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("demo", args)) => run_demo(args).await,
        Some(("status", args)) => run_status(args),
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
