use syn::{Error, Expr, Lit, LitStr};

/// Expect a literal string, error if that's not the case
pub fn expect_litstr(field_opt: &Option<Expr>) -> syn::Result<&LitStr> {
    let field = field_opt.as_ref().unwrap();
    let Expr::Lit(lit) = field else {
        // got non-literal
        let msg = "expected literal expression for this field";
        return Err(Error::new_spanned(field, msg));
    };
    let Lit::Str(litstr) = &lit.lit else {
        // got literal that wasn't a string
        let msg = "only literal strings are allowed for this field";
        return Err(Error::new_spanned(field, msg));
    };

    Ok(litstr)
}

/// Convert a string like "1.2" to a hex like "0x0102". Error if no decimal, or
/// if either value exceeds a u8.
pub fn version_int(s: &str) -> Result<u16, String> {
    const USAGE_MSG: &str = r#"expected a two position semvar string, e.g. "1.2""#;
    if s.chars().filter(|x| *x == '.').count() != 1 {
        return Err(USAGE_MSG.to_owned());
    }

    let splt = s.split_once('.').unwrap();
    let fmt_err = |e| format!("{e}\n{USAGE_MSG}");

    let major: u16 = splt.0.parse::<u8>().map_err(fmt_err)?.into();
    let minor: u16 = splt.1.parse::<u8>().map_err(fmt_err)?.into();
    let res: u16 = (major << 8) + minor;

    Ok(res)
}
