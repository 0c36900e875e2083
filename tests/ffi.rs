use localnative_core::ffi::{localnative_free, localnative_run};
use std::ffi::{CStr, CString};
use std::fs;
use std::path::Path;

fn call(request: &str) -> serde_json::Value {
    let input = CString::new(request).unwrap();
    unsafe {
        let out = localnative_run(input.as_ptr());
        assert!(!out.is_null());
        let text = CStr::from_ptr(out).to_str().unwrap().to_string();
        localnative_free(out);
        serde_json::from_str(&text).unwrap()
    }
}

// The only test in this binary that opens a database; its location comes
// from the environment.
#[test]
fn test_c_abi_against_env_database() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("mobile.sqlite3");
    std::env::set_var("LOCALNATIVE_DB", &db_path);

    let inserted = call(
        r#"{"action":"insert","title":"from swift","url":"https://example.com","tags":"ios",
            "description":"","comments":"","annotations":"","limit":10,"offset":0,"is_public":false}"#,
    );
    assert_eq!(inserted["count"], 1);
    assert!(db_path.exists());

    let found = call(r#"{"action":"search","query":"swift","limit":10,"offset":0}"#);
    assert_eq!(found["notes"][0]["tags"], "ios");

    let error = call("{}");
    assert!(error["error"].is_string());
}

#[test]
fn test_headers_declare_the_c_abi() {
    let include = Path::new(env!("CARGO_MANIFEST_DIR")).join("include");

    let core = fs::read_to_string(include.join("localnative-core.h")).unwrap();
    assert!(core.contains("#ifndef LOCALNATIVE_CORE_H"));
    assert!(core.contains("char *localnative_run(const char *json_input);"));
    assert!(core.contains("void localnative_free(char *s);"));
    assert!(core.contains("extern \"C\""));

    let bridge = fs::read_to_string(include.join("LocalNative-Bridging-Header.h")).unwrap();
    assert!(bridge.contains("#ifndef LocalNative_Bridging_Header_h"));
    assert!(bridge.contains("#define LocalNative_Bridging_Header_h"));
    assert!(bridge.contains("#import \"localnative-core.h\""));
}
