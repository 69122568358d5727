use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::cli::Component;

/// Utility function to build a LIMS search string from sample ids
///
/// Ids are split on whitespace, deduplicated, sorted and each
/// wrapped as a `LIKE` pattern.
///
/// # Example
///
/// ```compile
/// let s = exemplar_input_string("SPID02 SPID01\nSPID02");
/// assert_eq!(s, "%SPID01%,%SPID02%");
/// ```
pub fn exemplar_input_string(inp_dump: &str) -> String {
    inp_dump
        .split_whitespace()
        .collect::<BTreeSet<&str>>()
        .iter()
        .map(|id| format!("%{}%", id))
        .collect::<Vec<String>>()
        .join(",")
}

/// Get a single component of a path
///
/// Components that do not exist (e.g. the grandparent
/// of a bare file name) are empty strings.
pub fn path_component(path: &Path, component: Component) -> String {
    let name = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    match component {
        Component::Name => name(Some(path)),
        Component::Stem => path
            .with_extension("")
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Component::GrandParent => name(path.parent().and_then(Path::parent)),
        Component::Parent => name(path.parent()),
        Component::Path => path.to_string_lossy().into_owned(),
    }
}

/// Write the requested components of every path in a list file
///
/// One line per non-blank input line, components separated by tabs
/// in the order requested.
pub fn write_path_components<W: Write>(
    file: &Path,
    components: &[Component],
    mut writer: W,
) -> std::io::Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        let filepath = line.trim();
        if filepath.is_empty() {
            continue;
        }
        let path = Path::new(filepath);
        let fields: Vec<String> = components
            .iter()
            .map(|c| path_component(path, *c))
            .collect();
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn exemplar_input_sorted_unique() {
        assert_eq!(
            exemplar_input_string("SPIDxxx03 SPIDxxx01\tSPIDxxx02\nSPIDxxx01"),
            "%SPIDxxx01%,%SPIDxxx02%,%SPIDxxx03%"
        );
    }

    #[test]
    fn exemplar_input_empty() {
        assert_eq!(exemplar_input_string("   "), "");
    }

    #[test]
    fn path_components_nested() {
        let p = Path::new("/data/run1/sample/reads.fastq.gz");
        assert_eq!(path_component(p, Component::Name), "reads.fastq.gz");
        assert_eq!(path_component(p, Component::Stem), "reads");
        assert_eq!(path_component(p, Component::Parent), "sample");
        assert_eq!(path_component(p, Component::GrandParent), "run1");
        assert_eq!(path_component(p, Component::Path), "/data/run1/sample/reads.fastq.gz");
    }

    #[test]
    fn path_components_bare_file() {
        let p = Path::new("report.xlsx");
        assert_eq!(path_component(p, Component::Stem), "report");
        assert_eq!(path_component(p, Component::Parent), "");
        assert_eq!(path_component(p, Component::GrandParent), "");
    }

    #[test]
    fn path_components_dotfile() {
        assert_eq!(path_component(Path::new("a/.bashrc"), Component::Stem), ".bashrc");
    }

    #[test]
    fn write_components_skips_blank_lines() {
        let mut list = NamedTempFile::new().unwrap();
        writeln!(list, "/a/b/c.txt").unwrap();
        writeln!(list).unwrap();
        writeln!(list, "  x/y.tar.gz  ").unwrap();

        let mut out: Vec<u8> = vec![];
        write_path_components(list.path(), &[Component::Stem, Component::Parent], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "c\tb\ny\tx\n");
    }

    #[test]
    fn write_components_missing_file() {
        let out: Vec<u8> = vec![];
        let err = write_path_components(Path::new("file/doesnt/exist.txt"), &[Component::Name], out)
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
