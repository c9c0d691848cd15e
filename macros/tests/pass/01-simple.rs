include!("../include.rs");

register_plugin! {
    TestAuth,
    ptype: PluginType::Authentication,
    name: "test_auth_name",
    author: "Test Author",
    description: "Testing authentication registration",
    license: License::Gpl,
    maturity: Maturity::Experimental,
    version: "1.2",
    auth: TestAuth,
}

fn main() {
    use std::ffi::CStr;

    use dbauth::bindings::{st_auth_plugin, st_plugin_decl};

    // verify correct symbols are created
    let _: i32 = _plugin_interface_version_;
    let _: i32 = _sizeof_struct_st_plugin_;
    let plugin_def: &st_plugin_decl = unsafe { &*(_plugin_declarations_[0]).get() };

    // verify struct has correct fields
    let name = unsafe { CStr::from_ptr(plugin_def.name).to_str().unwrap() };
    let author = unsafe { CStr::from_ptr(plugin_def.author).to_str().unwrap() };
    let descr = unsafe { CStr::from_ptr(plugin_def.descr).to_str().unwrap() };

    assert_eq!(plugin_def.type_, PluginType::Authentication as i32);
    assert_eq!(name, "test_auth_name");
    assert_eq!(author, "Test Author");
    assert_eq!(descr, "Testing authentication registration");
    assert_eq!(plugin_def.license, License::Gpl as i32);
    assert_eq!(plugin_def.version, 0x0102);
    assert!(plugin_def.init.is_some());
    assert!(plugin_def.deinit.is_some());

    // the info pointer leads to the filled-in auth descriptor
    let auth: &st_auth_plugin = unsafe { &*plugin_def.info.cast::<st_auth_plugin>() };
    assert_eq!(
        auth.interface_version,
        dbauth::bindings::AUTH_INTERFACE_VERSION
    );
    assert!(auth.client_auth_plugin.is_null());
    assert!(auth.authenticate_user.is_some());
    assert!(auth.generate_authentication_string.is_some());
    assert!(auth.validate_authentication_string.is_some());
    assert!(auth.set_salt.is_some());
    assert_eq!(auth.authentication_flags, 0);
}
