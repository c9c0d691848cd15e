pub mod plugin {
    /// All fields, in expected order
    pub const ALL_FIELDS: &[&str] = &[
        "ptype",
        "name",
        "author",
        "description",
        "license",
        "maturity",
        "version",
        "init",
        "auth",
        "client_plugin",
    ];

    /// Always required
    pub const REQ_FIELDS: &[&str] = &[
        "ptype",
        "name",
        "author",
        "description",
        "license",
        "maturity",
        "version",
    ];

    pub const AUTH_REQ_FIELDS: &[&str] = &["auth"];

    pub const AUTH_OPT_FIELDS: &[&str] = &["init", "client_plugin"];
}
