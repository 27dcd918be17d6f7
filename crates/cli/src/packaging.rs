use anyhow::{bail, Context as AnyhowContext, Result};
use clap::ValueEnum;
use modforge_composer::DistTool;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Native packager that turns one Python entry file into a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingTool {
    Pyinstaller,
    Cxfreeze,
    Nuitka,
}

/// `--tool` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolChoice {
    Auto,
    Pyinstaller,
    Cxfreeze,
    Nuitka,
}

impl PackagingTool {
    /// Auto-selection priority
    pub const ALL: [Self; 3] = [Self::Pyinstaller, Self::Cxfreeze, Self::Nuitka];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pyinstaller => "pyinstaller",
            Self::Cxfreeze => "cxfreeze",
            Self::Nuitka => "nuitka",
        }
    }

    pub const fn install_hint(self) -> &'static str {
        match self {
            Self::Pyinstaller => "pip install pyinstaller",
            Self::Cxfreeze => "pip install cx_Freeze",
            Self::Nuitka => "pip install nuitka",
        }
    }

    pub fn is_available(self) -> bool {
        which::which(self.name()).is_ok()
    }

    /// Program arguments, excluding the program itself
    pub fn arguments(self, request: &PackageRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            Self::Pyinstaller => {
                if request.onefile {
                    args.push("--onefile".into());
                }
                if request.windowed {
                    args.push("--windowed".into());
                }
                if let Some(name) = &request.name {
                    args.push("--name".into());
                    args.push(name.into());
                }
                if let Some(icon) = &request.icon {
                    args.push("--icon".into());
                    args.push(icon.into());
                }
                args.push("--distpath".into());
                args.push(request.output_dir.clone().into());
                args.push(request.main_file.clone().into());
            }
            Self::Cxfreeze => {
                args.push(request.main_file.clone().into());
                if let Some(name) = &request.name {
                    args.push("--target-name".into());
                    args.push(name.into());
                }
                args.push("--target-dir".into());
                args.push(request.output_dir.clone().into());
            }
            Self::Nuitka => {
                args.push("--standalone".into());
                if request.onefile {
                    args.push("--onefile".into());
                }
                if let Some(icon) = &request.icon {
                    args.push("--windows-icon-from-ico".into());
                    args.push(icon.into());
                }
                args.push("--output-dir".into());
                args.push(request.output_dir.clone().into());
                args.push(request.main_file.clone().into());
            }
        }
        args
    }

    /// Runnable command; the working directory is the project root
    pub fn command(self, request: &PackageRequest) -> Command {
        let mut command = Command::new(self.name());
        command
            .args(self.arguments(request))
            .current_dir(&request.project_dir);
        command
    }

    /// Shell-like rendering for `--dry-run` and logs
    pub fn command_line(self, request: &PackageRequest) -> String {
        let mut parts = vec![self.name().to_string()];
        for arg in self.arguments(request) {
            let arg = arg.to_string_lossy().into_owned();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("\"{arg}\""));
            } else {
                parts.push(arg);
            }
        }
        parts.join(" ")
    }
}

impl fmt::Display for PackagingTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<DistTool> for PackagingTool {
    fn from(tool: DistTool) -> Self {
        match tool {
            DistTool::Pyinstaller => Self::Pyinstaller,
            DistTool::Cxfreeze => Self::Cxfreeze,
            DistTool::Nuitka => Self::Nuitka,
        }
    }
}

/// Everything a packager needs to know
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub project_dir: PathBuf,
    pub main_file: PathBuf,
    pub output_dir: PathBuf,
    pub onefile: bool,
    pub windowed: bool,
    pub icon: Option<PathBuf>,
    pub name: Option<String>,
}

/// Pick the packager.
///
/// Without a choice the configured tool is tried first, then the rest in
/// priority order; `auto` uses the priority order alone. With
/// `require_available` off the first candidate is returned when none is
/// installed.
pub fn select_tool(
    choice: Option<ToolChoice>,
    configured: DistTool,
    require_available: bool,
    is_available: impl Fn(PackagingTool) -> bool,
) -> Result<PackagingTool> {
    let candidates: Vec<PackagingTool> = match choice {
        Some(ToolChoice::Pyinstaller) => vec![PackagingTool::Pyinstaller],
        Some(ToolChoice::Cxfreeze) => vec![PackagingTool::Cxfreeze],
        Some(ToolChoice::Nuitka) => vec![PackagingTool::Nuitka],
        Some(ToolChoice::Auto) => PackagingTool::ALL.to_vec(),
        None => {
            let preferred = PackagingTool::from(configured);
            std::iter::once(preferred)
                .chain(PackagingTool::ALL.into_iter().filter(|t| *t != preferred))
                .collect()
        }
    };

    if let [only] = candidates.as_slice() {
        if !require_available || is_available(*only) {
            return Ok(*only);
        }
        bail!(
            "packager `{only}` is not installed (try `{}`)",
            only.install_hint()
        );
    }

    if let Some(tool) = candidates.iter().copied().find(|t| is_available(*t)) {
        return Ok(tool);
    }
    if !require_available {
        return Ok(candidates[0]);
    }
    let hints: Vec<String> = PackagingTool::ALL
        .iter()
        .map(|t| format!("{t}: {}", t.install_hint()))
        .collect();
    bail!("no packager found on PATH; install one of: {}", hints.join("; "))
}

/// Run the packager and fail on a nonzero exit status
pub fn run(tool: PackagingTool, request: &PackageRequest) -> Result<()> {
    log::info!("Running {}", tool.command_line(request));
    let status = tool
        .command(request)
        .status()
        .with_context(|| format!("Failed to start {tool}"))?;
    if !status.success() {
        bail!("{tool} exited with {status}");
    }
    Ok(())
}

/// Absolute form of `path`, resolved against `base` when relative
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PackageRequest {
        PackageRequest {
            project_dir: PathBuf::from("/work/app"),
            main_file: PathBuf::from("/work/app/build/main.py"),
            output_dir: PathBuf::from("/work/app/dist"),
            onefile: true,
            windowed: true,
            icon: Some(PathBuf::from("/work/app/icon.ico")),
            name: Some("Monitor".to_string()),
        }
    }

    #[test]
    fn test_pyinstaller_arguments() {
        assert_eq!(
            PackagingTool::Pyinstaller.command_line(&request()),
            "pyinstaller --onefile --windowed --name Monitor --icon /work/app/icon.ico \
             --distpath /work/app/dist /work/app/build/main.py"
        );
    }

    #[test]
    fn test_cxfreeze_arguments() {
        assert_eq!(
            PackagingTool::Cxfreeze.command_line(&request()),
            "cxfreeze /work/app/build/main.py --target-name Monitor --target-dir /work/app/dist"
        );
    }

    #[test]
    fn test_nuitka_arguments() {
        let mut request = request();
        request.output_dir = PathBuf::from("/work/my app/dist");
        assert_eq!(
            PackagingTool::Nuitka.command_line(&request),
            "nuitka --standalone --onefile --windows-icon-from-ico /work/app/icon.ico \
             --output-dir \"/work/my app/dist\" /work/app/build/main.py"
        );
    }

    #[test]
    fn test_auto_follows_priority() {
        let only_nuitka = |t: PackagingTool| t == PackagingTool::Nuitka;
        let tool = select_tool(Some(ToolChoice::Auto), DistTool::Pyinstaller, true, only_nuitka)
            .unwrap();
        assert_eq!(tool, PackagingTool::Nuitka);

        let all = |_: PackagingTool| true;
        let tool = select_tool(Some(ToolChoice::Auto), DistTool::Nuitka, true, all).unwrap();
        assert_eq!(tool, PackagingTool::Pyinstaller);
    }

    #[test]
    fn test_configured_tool_goes_first() {
        let all = |_: PackagingTool| true;
        assert_eq!(
            select_tool(None, DistTool::Cxfreeze, true, all).unwrap(),
            PackagingTool::Cxfreeze
        );

        let no_cxfreeze = |t: PackagingTool| t != PackagingTool::Cxfreeze;
        assert_eq!(
            select_tool(None, DistTool::Cxfreeze, true, no_cxfreeze).unwrap(),
            PackagingTool::Pyinstaller
        );
    }

    #[test]
    fn test_missing_tools_are_reported() {
        let none = |_: PackagingTool| false;
        let err = select_tool(Some(ToolChoice::Auto), DistTool::Pyinstaller, true, none)
            .unwrap_err();
        assert!(err.to_string().contains("pip install cx_Freeze"));

        let err = select_tool(Some(ToolChoice::Nuitka), DistTool::Pyinstaller, true, none)
            .unwrap_err();
        assert!(err.to_string().contains("pip install nuitka"));

        let tool =
            select_tool(Some(ToolChoice::Nuitka), DistTool::Pyinstaller, false, none).unwrap();
        assert_eq!(tool, PackagingTool::Nuitka);
        let tool = select_tool(None, DistTool::Cxfreeze, false, none).unwrap();
        assert_eq!(tool, PackagingTool::Cxfreeze);
    }
}
