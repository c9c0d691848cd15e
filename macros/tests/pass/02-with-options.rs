include!("../include.rs");

register_plugin! {
    TestAuth,
    ptype: PluginType::Authentication,
    name: "test_auth_full",
    author: "Test Author",
    description: "Testing authentication registration with options",
    license: License::Gpl,
    maturity: Maturity::Experimental,
    version: "0.1",
    init: TestAuth,
    auth: TestAuth,
    client_plugin: "test_auth_client",
}

fn main() {
    use std::ffi::CStr;

    use dbauth::bindings::st_auth_plugin;

    let plugin_def = unsafe { &*(_plugin_declarations_[0]).get() };
    let auth: &st_auth_plugin = unsafe { &*plugin_def.info.cast::<st_auth_plugin>() };

    let client = unsafe { CStr::from_ptr(auth.client_auth_plugin).to_str().unwrap() };
    assert_eq!(client, "test_auth_client");
    assert!(plugin_def.init.is_some());
    assert!(plugin_def.deinit.is_some());

    // declaration array ends with the null sentinel
    let sentinel = unsafe { &*(_plugin_declarations_[1]).get() };
    assert!(sentinel.name.is_null());
    assert!(sentinel.info.is_null());
}
