//! Verbose mode touches process-wide SQLite state, so it gets its own test binary.
//! Run with: cargo test --test verbose_test

use serde_json::json;
use sqlite_task::{is_verbose, verbose, Database, OpenMode, Params};

#[tokio::test]
async fn test_verbose_is_one_shot_and_keeps_adapter_working() {
    assert!(!is_verbose());
    verbose();
    verbose();
    assert!(is_verbose());

    let db = Database::open(":memory:", OpenMode::default()).await.unwrap();
    db.exec("CREATE TABLE t (v TEXT)").await.unwrap();
    db.run("INSERT INTO t VALUES (?)", json!(["x"])).await.unwrap();
    assert!(db.get("SELECT nope FROM t", Params::None).await.is_err());

    let rows = db.all("SELECT v FROM t", Params::None).await.unwrap();
    assert_eq!(rows[0]["v"], json!("x"));
}
