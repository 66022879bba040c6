//! Reading untrusted YAML with the security filter switched on.
//!
//! Run with: cargo run --example secure_yaml

use ingestguard::{
    DynamicRecord, ErrorAction, MemoryErrorSink, ReadOptions, YamlLimits, YamlOptions, YamlReader,
};

const UPLOAD: &str = "\
- name: web
  replicas: 3
- &base
  name: worker
  replicas: 2
- *base
- !!python/object:os.system
  name: evil
- name: deep
  spec:
    template:
      containers:
        image: nginx
- name: cache
  replicas: 1
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let errors = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(errors.clone())
        .with_file_id("upload.yaml");
    let metrics = read.metrics().clone();

    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_depth(3));

    let records = YamlReader::<_, DynamicRecord>::new(UPLOAD.as_bytes(), options, read)
        .collect::<Result<Vec<_>, _>>()?;

    println!("Accepted {} record(s):", records.len());
    for record in &records {
        println!("  - {}", serde_json::to_string(record)?);
    }

    println!("Rejected {} record(s):", errors.len());
    for error in errors.errors() {
        println!("  - {}", error);
    }

    println!("{:?}", metrics.snapshot());
    Ok(())
}
