use std::path::Path;

use anexa::artifacts::{matching_folders, scan_artifacts};
use tempfile::tempdir;

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"x").unwrap();
}

#[test]
fn folders_match_by_instrument_substring() {
    let base = tempdir().unwrap();
    std::fs::create_dir(base.path().join("CT 914708 - Projetos")).unwrap();
    std::fs::create_dir(base.path().join("914708 antigo")).unwrap();
    std::fs::create_dir(base.path().join("CT 555555")).unwrap();
    // A plain file whose name matches must not count.
    touch(&base.path().join("914708.txt"));

    let found = matching_folders(base.path(), "914708").unwrap();
    let names: Vec<_> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["914708 antigo", "CT 914708 - Projetos"]);
}

#[test]
fn no_matching_folder_is_a_valid_empty_outcome() {
    let base = tempdir().unwrap();
    std::fs::create_dir(base.path().join("CT 555555")).unwrap();
    assert!(matching_folders(base.path(), "914708").unwrap().is_empty());
}

#[test]
fn scan_keeps_only_pdf_and_zip_case_insensitively() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("relatorio.pdf"));
    touch(&dir.path().join("ANEXOS.ZIP"));
    touch(&dir.path().join("notas.txt"));
    touch(&dir.path().join("planilha.xlsx"));
    touch(&dir.path().join("sem_extensao"));

    let artifacts = scan_artifacts(dir.path()).unwrap();
    let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["ANEXOS.ZIP", "relatorio.pdf"]);
}

#[test]
fn scan_recurses_and_sorts_by_full_path() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("b.pdf"));
    touch(&dir.path().join("a").join("z.pdf"));
    touch(&dir.path().join("c").join("fundo").join("x.zip"));

    let artifacts = scan_artifacts(dir.path()).unwrap();
    let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["z.pdf", "b.pdf", "x.zip"]);
}

#[test]
fn empty_folder_yields_no_artifacts() {
    let dir = tempdir().unwrap();
    assert!(scan_artifacts(dir.path()).unwrap().is_empty());
}
