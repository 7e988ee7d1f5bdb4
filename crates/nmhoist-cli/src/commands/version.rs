use miette::Result;
use nmhoist_core::version::{version_string, SCHEMA_VERSION, VERSION};

pub fn run(json: bool) -> Result<()> {
    if json {
        super::print_json(&serde_json::json!({
            "version": VERSION,
            "schema_version": SCHEMA_VERSION,
        }))
    } else {
        println!("{}", version_string());
        Ok(())
    }
}
