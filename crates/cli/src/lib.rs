use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use modforge_composer::{
    ComposeWarning, DecomposeReport, Decomposer, ModforgeConfig, Project, RecomposeOptions,
    RecomposeReport, Recomposer, MODULES_DIR,
};
use packaging::{PackageRequest, PackagingTool, ToolChoice};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

mod logging;
mod packaging;

/// Directory under the project root receiving the source handed to packagers
const BUILD_DIR: &str = "build";
/// Default packager output directory under the project root
const DIST_DIR: &str = "dist";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "modforge")]
#[command(
    about = "Split a monolithic Python file into category modules and build it back",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: <project>/modforge.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the log of this run to <DIR>/modforge-<unix-ms>.log
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a source file into per-category modules
    Rebuild(RebuildArgs),

    /// Recompose modules into a single source file
    Build(BuildArgs),

    /// Recompose and hand the result to a native packager
    Dist(DistArgs),
}

#[derive(Args)]
struct RebuildArgs {
    /// Project directory; without it --file is a path
    #[arg(long)]
    project: Option<PathBuf>,

    /// Source file to decompose (relative to --project when given)
    #[arg(long)]
    file: PathBuf,

    /// Modules directory (default: <project>/modules)
    #[arg(long)]
    target: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BuildArgs {
    /// Project directory; modules are read from <project>/modules
    #[arg(long, conflicts_with = "modules_dir", required_unless_present = "modules_dir")]
    project: Option<PathBuf>,

    /// Modules directory to recompose
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Output file (default: <modules_dir>_built.py next to the modules directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Remove unused imports and normalize blank lines
    #[arg(long)]
    cleanup: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DistArgs {
    /// Project directory
    #[arg(long)]
    project: PathBuf,

    /// Entry file of the project
    #[arg(long, default_value = "main.py")]
    main: PathBuf,

    /// Packager (default: the configured tool, then the first one installed)
    #[arg(long, value_enum)]
    tool: Option<ToolChoice>,

    /// Distribution directory (default: <project>/dist)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Produce a single executable
    #[arg(long)]
    onefile: bool,

    /// Hide the console window
    #[arg(long)]
    windowed: bool,

    /// Application icon
    #[arg(long)]
    icon: Option<PathBuf>,

    /// Name of the produced executable
    #[arg(long)]
    name: Option<String>,

    /// Print the packager command instead of running it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Serialize)]
struct ModuleOutput {
    category: String,
    path: PathBuf,
    declarations: usize,
}

#[derive(Serialize)]
struct RebuildOutput {
    source_file: PathBuf,
    declarations: usize,
    modules: Vec<ModuleOutput>,
    metadata_path: PathBuf,
    warnings: Vec<String>,
}

impl From<DecomposeReport> for RebuildOutput {
    fn from(report: DecomposeReport) -> Self {
        Self {
            source_file: report.source_file,
            declarations: report.declarations,
            modules: report
                .modules
                .into_iter()
                .map(|m| ModuleOutput {
                    category: m.category,
                    path: m.path,
                    declarations: m.declarations,
                })
                .collect(),
            metadata_path: report.metadata_path,
            warnings: warning_lines(&report.warnings),
        }
    }
}

#[derive(Serialize)]
struct BuildOutput {
    output: PathBuf,
    declarations: usize,
    exact: bool,
    deduplicated_imports: Vec<String>,
    removed_imports: Vec<String>,
    warnings: Vec<String>,
}

impl From<RecomposeReport> for BuildOutput {
    fn from(report: RecomposeReport) -> Self {
        Self {
            output: report.output,
            declarations: report.declarations,
            exact: report.exact,
            deduplicated_imports: report.deduplicated_imports,
            removed_imports: report.removed_imports,
            warnings: warning_lines(&report.warnings),
        }
    }
}

fn warning_lines(warnings: &[ComposeWarning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = logging::init(cli.verbose, cli.quiet, cli.log_dir.as_deref())? {
        log::debug!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Rebuild(args) => run_rebuild(args, cli.config.as_deref())?,
        Commands::Build(args) => run_build(args, cli.config.as_deref())?,
        Commands::Dist(args) => run_dist(args, cli.config.as_deref())?,
    }
    Ok(())
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ModforgeConfig> {
    ModforgeConfig::discover(root, explicit).context("Failed to load configuration")
}

fn canonical_dir(path: &Path, what: &str) -> Result<PathBuf> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("{what} not found: {}", path.display()))?;
    if !dir.is_dir() {
        bail!("{what} is not a directory: {}", dir.display());
    }
    Ok(dir)
}

/// Decompose a source file
fn run_rebuild(args: RebuildArgs, config_path: Option<&Path>) -> Result<()> {
    let mut project = match &args.project {
        Some(dir) => Project::new(canonical_dir(dir, "Project directory")?, &args.file),
        None => {
            let file = args
                .file
                .canonicalize()
                .with_context(|| format!("Source file not found: {}", args.file.display()))?;
            Project::from_source_file(file)
        }
    };
    if let Some(target) = &args.target {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        project = project.with_modules_dir(packaging::absolutize(&cwd, target));
    }

    let config = load_config(project.root(), config_path)?;
    let report = Decomposer::new(config)
        .run(&project)
        .with_context(|| format!("Failed to decompose {}", args.file.display()))?;
    let output = RebuildOutput::from(report);

    if args.json {
        return print_stdout(&serde_json::to_string_pretty(&output)?);
    }
    print_stdout(&format!(
        "Decomposed {} declarations from {} into {} modules",
        output.declarations,
        output.source_file.display(),
        output.modules.len()
    ))?;
    for module in &output.modules {
        print_stdout(&format!(
            "  {:<12} {:>4}  {}",
            module.category,
            module.declarations,
            module.path.display()
        ))?;
    }
    if !output.warnings.is_empty() {
        print_stdout(&format!("{} warning(s), see log", output.warnings.len()))?;
    }
    Ok(())
}

/// Recompose a modules directory
fn run_build(args: BuildArgs, config_path: Option<&Path>) -> Result<()> {
    let modules_dir = match (&args.project, &args.modules_dir) {
        (Some(project), _) => canonical_dir(project, "Project directory")?.join(MODULES_DIR),
        (None, Some(dir)) => dir.clone(),
        (None, None) => bail!("either --project or --modules-dir is required"),
    };
    let project = Project::from_modules_dir(modules_dir);
    let config = load_config(project.root(), config_path)?;

    let options = RecomposeOptions {
        output: args.output.clone(),
        cleanup: args.cleanup,
    };
    let report = Recomposer::new(config)
        .run(&project, &options)
        .with_context(|| format!("Failed to build {}", project.modules_dir().display()))?;
    let output = BuildOutput::from(report);

    if args.json {
        return print_stdout(&serde_json::to_string_pretty(&output)?);
    }
    print_stdout(&format!(
        "Built {} declarations into {}",
        output.declarations,
        output.output.display()
    ))?;
    if !output.removed_imports.is_empty() {
        print_stdout(&format!(
            "Removed unused imports: {}",
            output.removed_imports.join(" | ")
        ))?;
    }
    if !output.warnings.is_empty() {
        print_stdout(&format!("{} warning(s), see log", output.warnings.len()))?;
    }
    Ok(())
}

/// Recompose (when modules exist) and run a packager on the result
fn run_dist(args: DistArgs, config_path: Option<&Path>) -> Result<()> {
    let root = canonical_dir(&args.project, "Project directory")?;
    let config = load_config(&root, config_path)?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let main_name = args
        .main
        .file_name()
        .with_context(|| format!("Invalid main file: {}", args.main.display()))?;
    let project = Project::new(&root, &args.main);
    let main_file = if project.modules_dir().is_dir() {
        let staged = root.join(BUILD_DIR).join(main_name);
        let options = RecomposeOptions {
            output: Some(staged),
            cleanup: true,
        };
        let report = Recomposer::new(config.clone())
            .run(&project, &options)
            .context("Failed to recompose modules for packaging")?;
        log::info!("Recomposed source staged at {}", report.output.display());
        report.output
    } else {
        let main_file = root.join(&args.main);
        if !main_file.is_file() {
            bail!("Main file not found: {}", main_file.display());
        }
        log::info!(
            "No modules directory in {}; packaging {} as is",
            root.display(),
            main_file.display()
        );
        main_file
    };

    let tool = packaging::select_tool(
        args.tool,
        config.dist.default_tool,
        !args.dry_run,
        PackagingTool::is_available,
    )?;
    let request = PackageRequest {
        project_dir: root.clone(),
        main_file,
        output_dir: args
            .output
            .as_deref()
            .map_or_else(|| root.join(DIST_DIR), |dir| packaging::absolutize(&cwd, dir)),
        onefile: args.onefile,
        windowed: args.windowed,
        icon: args.icon.as_deref().map(|icon| packaging::absolutize(&cwd, icon)),
        name: args.name.clone(),
    };

    if args.dry_run {
        return print_stdout(&tool.command_line(&request));
    }
    packaging::run(tool, &request)?;
    print_stdout(&format!(
        "Distribution created with {tool} in {}",
        request.output_dir.display()
    ))
}
