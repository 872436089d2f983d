/// Tests for ShaderCode loading and validation

use super::*;

fn spirv_bytes(extra_words: &[u32]) -> Vec<u8> {
    std::iter::once(SPIRV_MAGIC)
        .chain(extra_words.iter().copied())
        .flat_map(u32::to_le_bytes)
        .collect()
}

#[test]
fn test_from_bytes_accepts_magic() {
    let code = ShaderCode::from_bytes(&spirv_bytes(&[0x0001_0000, 7]), PathBuf::from("a.spv")).unwrap();
    assert_eq!(code.words(), &[SPIRV_MAGIC, 0x0001_0000, 7]);
    assert_eq!(code.origin(), Path::new("a.spv"));
}

#[test]
fn test_unaligned_size_is_parse_error() {
    let mut bytes = spirv_bytes(&[1]);
    bytes.push(0);
    let result = ShaderCode::from_bytes(&bytes, PathBuf::from("odd.spv"));
    assert!(matches!(result, Err(Error::Parse { .. })));
}

#[test]
fn test_empty_and_wrong_magic_rejected() {
    assert!(ShaderCode::from_bytes(&[], PathBuf::from("empty.spv")).is_err());
    let result = ShaderCode::from_bytes(&[1, 2, 3, 4], PathBuf::from("text.spv"));
    match result {
        Err(e @ Error::Parse { .. }) => assert!(e.is_recoverable()),
        other => panic!("expected Parse error, got {:?}", other),
    }
}

#[test]
fn test_load_missing_file_is_io() {
    let path = std::env::temp_dir().join(format!("ember_missing_{}.spv", std::process::id()));
    assert!(matches!(ShaderCode::load(&path), Err(Error::Io { .. })));
}

#[test]
fn test_load_reads_file() {
    let path = std::env::temp_dir().join(format!("ember_shader_{}.spv", std::process::id()));
    std::fs::write(&path, spirv_bytes(&[42])).unwrap();

    let code = ShaderCode::load(&path).unwrap();
    assert_eq!(code.words(), &[SPIRV_MAGIC, 42]);

    std::fs::remove_file(&path).ok();
}
