use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions accepted at upload time.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx"];

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex"));

/// True when `filename` carries one of the allowed extensions.
pub fn is_allowed(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Reduce a client-supplied filename to a flat, ASCII-only name that is safe
/// to join onto the upload directory.
///
/// Path separators become spaces, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9_.-]` is dropped and leading/trailing dots and underscores are
/// trimmed. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Collection name for a stored document: its filename without extension.
pub fn collection_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_checks_extension_only() {
        assert!(is_allowed("policy.pdf"));
        assert!(is_allowed("Policy.DOCX"));
        assert!(is_allowed("archive.tar.pdf"));
        assert!(!is_allowed("policy.doc"));
        assert!(!is_allowed("policy.pdf.exe"));
        assert!(!is_allowed("pdf"));
        assert!(!is_allowed(""));
    }

    #[test]
    fn secure_filename_flattens_paths() {
        assert_eq!(secure_filename("My cool policy.pdf"), "My_cool_policy.pdf");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\plan.docx"), "C_Users_me_plan.docx");
        assert_eq!(secure_filename("política de acceso.pdf"), "poltica_de_acceso.pdf");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn secure_filename_is_idempotent() {
        let once = secure_filename("Information Security Policy (v2).docx");
        assert_eq!(secure_filename(&once), once);
        assert_eq!(once, "Information_Security_Policy_v2.docx");
    }

    #[test]
    fn collection_name_strips_extension() {
        assert_eq!(collection_name("access_policy.pdf"), "access_policy");
        assert_eq!(collection_name("v1.2_policy.docx"), "v1.2_policy");
        assert_eq!(collection_name("noext"), "noext");
    }
}
