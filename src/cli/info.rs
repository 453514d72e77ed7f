use symdex::DatabaseWriter;

pub fn show_info() {
    println!("symdex {}", DatabaseWriter::version_string());
    println!("Supported database version: {}", DatabaseWriter::supported_database_version());
}
