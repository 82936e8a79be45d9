fn main() {
    // Only the ESP-IDF build carries the sysenv; host builds run the portable core and its tests.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
