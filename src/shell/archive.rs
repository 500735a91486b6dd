//! Archive and download helpers shared by the add-unpack and related rules.

use super::command::CommandInfo;
use super::basename;

/// Archive file extensions, sorted longest-first so suffix matching is
/// greedy (".tar.gz" is checked before ".gz"). Extensions are
/// case-sensitive: `.Z` and `.tZ` use uppercase Z for Unix compress format.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.lzma",
    ".tar.bz2",
    ".tar.gz",
    ".tar.xz",
    ".tar.zst",
    ".tar.lz",
    ".tar.Z",
    ".lzma",
    ".tbz2",
    ".tzst",
    ".tar",
    ".tbz",
    ".tb2",
    ".tgz",
    ".tlz",
    ".tpz",
    ".txz",
    ".bz2",
    ".tZ",
    ".gz",
    ".lz",
    ".xz",
    ".Z",
];

/// Commands that download remote files.
pub const DOWNLOAD_COMMANDS: &[&str] = &["curl", "wget"];

/// Commands that extract archives, excluding tar (which needs flag checking
/// via `is_tar_extract`).
pub const EXTRACTION_COMMANDS: &[&str] = &[
    "bunzip2",
    "gzcat",
    "gunzip",
    "uncompress",
    "unlzma",
    "unxz",
    "unzip",
    "zcat",
    "zgz",
];

/// Checks if a filename has a recognized archive extension.
pub fn is_archive_filename(name: &str) -> bool {
    ARCHIVE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Checks if a URL string points to an archive file. Requires an
/// http/https/ftp scheme; query and fragment are stripped before checking.
pub fn is_archive_url(s: &str) -> bool {
    if !s.starts_with("http://") && !s.starts_with("https://") && !s.starts_with("ftp://") {
        return false;
    }
    let mut u = s;
    if let Some(i) = u.find('?') {
        u = &u[..i];
    }
    if let Some(i) = u.find('#') {
        u = &u[..i];
    }
    is_archive_filename(basename(u))
}

/// Checks if a tar invocation has extraction flags (-x, --extract, --get).
pub fn is_tar_extract(cmd: &CommandInfo) -> bool {
    for arg in &cmd.args {
        if !arg.starts_with('-') {
            continue;
        }
        if arg == "--extract" || arg == "--get" {
            return true;
        }
        if !arg.starts_with("--") && arg.contains('x') {
            return true;
        }
    }
    false
}

/// Extracts the target directory from a tar invocation: `-C <dir>`,
/// `--directory <dir>`, or `--directory=<dir>`. Empty when absent.
pub fn tar_destination(cmd: &CommandInfo) -> Option<&str> {
    for (i, arg) in cmd.args.iter().enumerate() {
        if let Some(after) = arg.strip_prefix("--directory=") {
            return Some(after);
        }
        if (arg == "--directory" || arg == "-C") && i + 1 < cmd.args.len() {
            return Some(&cmd.args[i + 1]);
        }
    }
    None
}

/// Extracts the output filename from a curl or wget invocation. Returns
/// `None` when no output file is given or the output is stdout (`-`).
pub fn download_output_file(cmd: &CommandInfo) -> Option<&str> {
    let (short, long) = match cmd.name.as_str() {
        "curl" => ("-o", "--output"),
        "wget" => ("-O", "--output-document"),
        _ => return None,
    };
    let long_eq = format!("{long}=");
    for (i, arg) in cmd.args.iter().enumerate() {
        if let Some(after) = arg.strip_prefix(&long_eq) {
            return if after == "-" { None } else { Some(after) };
        }
        if (arg == short || arg == long) && i + 1 < cmd.args.len() {
            let val = &cmd.args[i + 1];
            return if val == "-" { None } else { Some(val) };
        }
    }
    None
}

/// Extracts the first URL argument (http/https/ftp) from a download command.
pub fn download_url(cmd: &CommandInfo) -> Option<&str> {
    cmd.args.iter().map(|s| s.as_str()).find(|a| {
        a.starts_with("http://") || a.starts_with("https://") || a.starts_with("ftp://")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, args: &[&str]) -> CommandInfo {
        CommandInfo {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..CommandInfo::default()
        }
    }

    #[test]
    fn test_is_archive_filename() {
        assert!(is_archive_filename("app.tar.gz"));
        assert!(is_archive_filename("app.tgz"));
        assert!(is_archive_filename("data.Z"));
        assert!(!is_archive_filename("app.txt"));
        // Case-sensitive: lowercase z is not Unix compress.
        assert!(!is_archive_filename("data.z"));
    }

    #[test]
    fn test_is_archive_url() {
        assert!(is_archive_url("https://example.org/release/app.tar.gz"));
        assert!(is_archive_url("http://example.org/app.tgz?token=abc"));
        assert!(is_archive_url("ftp://mirror/app.tar.xz#frag"));
        assert!(!is_archive_url("https://example.org/app"));
        assert!(!is_archive_url("/local/app.tar.gz"));
    }

    #[test]
    fn test_is_tar_extract() {
        assert!(is_tar_extract(&info("tar", &["-xzf", "app.tar.gz"])));
        assert!(is_tar_extract(&info("tar", &["--extract", "-f", "a.tar"])));
        assert!(is_tar_extract(&info("tar", &["--get", "-f", "a.tar"])));
        assert!(!is_tar_extract(&info("tar", &["-czf", "out.tar.gz", "."])));
        // "x" in a non-flag arg does not count.
        assert!(!is_tar_extract(&info("tar", &["-cf", "x.tar", "x"])));
    }

    #[test]
    fn test_tar_destination() {
        assert_eq!(
            tar_destination(&info("tar", &["-xzf", "a.tgz", "-C", "/opt"])),
            Some("/opt")
        );
        assert_eq!(
            tar_destination(&info("tar", &["--directory=/srv", "-x"])),
            Some("/srv")
        );
        assert_eq!(tar_destination(&info("tar", &["-xzf", "a.tgz"])), None);
    }

    #[test]
    fn test_download_output_file() {
        assert_eq!(
            download_output_file(&info("curl", &["-o", "out.tgz", "http://x"])),
            Some("out.tgz")
        );
        assert_eq!(
            download_output_file(&info("wget", &["--output-document=out", "http://x"])),
            Some("out")
        );
        // stdout output is not a file
        assert_eq!(
            download_output_file(&info("curl", &["-o", "-", "http://x"])),
            None
        );
        assert_eq!(download_output_file(&info("tar", &["-o", "x"])), None);
    }

    #[test]
    fn test_download_url() {
        assert_eq!(
            download_url(&info("curl", &["-sL", "https://x/y.tgz"])),
            Some("https://x/y.tgz")
        );
        assert_eq!(download_url(&info("curl", &["-sL"])), None);
    }
}
