//! Driver entry point tests

use expect_test::expect;
use sq_driver::{compile_file, compile_json, compile_unit, LowerConfig};
use sq_lower::{ErrorKind, LowerError};
use sq_span::FileId;
use sq_syntax::{Expr, Stmt};
use std::io::Write;

const PROGRAM: &str = r#"{
    "kind": {"Suite": [
        {"kind": {"Assign": {"lhs": {"kind": {"Id": "x"}}, "rhs": {"kind": {"Int": 1}}}}},
        {"kind": {"Print": {"kind": {"Id": "x"}}}}
    ]}
}"#;

#[test]
fn test_compile_json() {
    let session = compile_json(&LowerConfig::default(), PROGRAM).unwrap();
    expect![[r#"
        var x: int = 1
        print x
    "#]]
    .assert_eq(&session.render());
}

#[test]
fn test_malformed_json() {
    let error = compile_json(&LowerConfig::default(), "{\"kind\": 3}").unwrap_err();
    assert_eq!(error.to_string(), "Failed to parse statement tree");
}

#[test]
fn test_lowering_error_is_preserved() {
    let config = LowerConfig {
        file_id: 7,
        ..LowerConfig::default()
    };
    let root = Stmt::suite(vec![Stmt::ret(None)]);
    let error = compile_unit(&config, &root).unwrap_err();
    assert_eq!(error.to_string(), "Failed to lower compilation unit");
    let cause = error.downcast_ref::<LowerError>().unwrap();
    assert_eq!(cause.kind(), ErrorKind::ReturnOutsideFunction);
    assert_eq!(cause.span().file, FileId(7));
}

#[test]
fn test_config_without_prelude() {
    let config = LowerConfig::from_toml_str("prelude = false").unwrap();
    let root = Stmt::suite(vec![Stmt::print(Expr::call(Expr::id("range"), vec![Expr::int(3)]))]);
    let error = compile_unit(&config, &root).unwrap_err();
    let cause = error.downcast_ref::<LowerError>().unwrap();
    assert_eq!(cause.kind(), ErrorKind::UnboundIdentifier);

    compile_unit(&LowerConfig::default(), &root).unwrap();
}

#[test]
fn test_config_flags_reach_the_session() {
    let config = LowerConfig::from_toml_str("flags = [\"atomic\"]").unwrap();
    let session = compile_unit(&config, &Stmt::suite(Vec::new())).unwrap();
    assert!(session.ctx.flag("atomic"));
}

#[test]
fn test_load_and_compile_files() {
    let dir = tempfile::tempdir().unwrap();

    let config_path = dir.path().join("lower.toml");
    std::fs::File::create(&config_path)
        .unwrap()
        .write_all(b"file_id = 3\npointer_width = 4\n")
        .unwrap();
    let config = LowerConfig::load(&config_path).unwrap();
    assert_eq!(config.file_id, 3);
    assert_eq!(config.pointer_width, 4);

    let program_path = dir.path().join("unit.json");
    std::fs::write(&program_path, PROGRAM).unwrap();
    let session = compile_file(&config, &program_path).unwrap();
    assert_eq!(session.file, FileId(3));
    assert_eq!(session.types.pointer_width(), 4);

    let missing = compile_file(&config, dir.path().join("missing.json")).unwrap_err();
    assert!(missing.to_string().starts_with("Failed to read statement tree"));
}
