use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemFn, LitStr, Pat, Type, parse_macro_input};

// #[function] / #[function("TypeName")]
// Registers an `fn(f64, ...) -> f64` (up to 3 parameters) as a static method of the class
// `Functions`, or of the class named in the attribute.
#[proc_macro_attribute]
pub fn function(attr: TokenStream, item: TokenStream) -> TokenStream {
    let type_name = if attr.is_empty() {
        "Functions".to_string()
    } else {
        parse_macro_input!(attr as LitStr).value()
    };
    let func = parse_macro_input!(item as ItemFn);
    let sig = &func.sig;
    let ident = &sig.ident;

    // Verify return type is f64
    let ret_ok = match &sig.output {
        syn::ReturnType::Type(_, ty) => matches!(**ty, Type::Path(ref tp) if tp.path.is_ident("f64")),
        syn::ReturnType::Default => false,
    };
    if !ret_ok {
        return syn::Error::new_spanned(&sig.output, "#[function] requires return type f64")
            .to_compile_error()
            .into();
    }

    let mut arity: usize = 0;
    for input in &sig.inputs {
        match input {
            FnArg::Typed(pt) => {
                if !matches!(&*pt.pat, Pat::Ident(_)) {
                    return syn::Error::new_spanned(
                        &pt.pat,
                        "#[function] requires simple identifier parameters",
                    )
                    .to_compile_error()
                    .into();
                }
                if !matches!(*pt.ty, Type::Path(ref tp) if tp.path.is_ident("f64")) {
                    return syn::Error::new_spanned(&pt.ty, "#[function] only supports f64 parameters")
                        .to_compile_error()
                        .into();
                }
                arity += 1;
            }
            _ => {
                return syn::Error::new_spanned(
                    input,
                    "#[function] does not support receiver parameters",
                )
                .to_compile_error()
                .into();
            }
        }
    }
    if arity > 3 {
        return syn::Error::new_spanned(
            &sig.inputs,
            "#[function] currently supports up to 3 parameters",
        )
        .to_compile_error()
        .into();
    }

    let name_str = ident.to_string();
    let shim_ident = format_ident!("__exprbind_shim_{}", ident);

    // Read every argument back as f64, in declaration order
    let call_args = (0..arity).map(|i| quote! { ::exprbind::f64_arg(args, #i)? });

    let arity_lit = arity as u8;

    let output = quote! {
        #func

        #[allow(non_snake_case, unused_variables)]
        fn #shim_ident(
            args: &[::exprbind::Value],
        ) -> ::core::result::Result<::exprbind::Value, ::exprbind::EvalError> {
            ::core::result::Result::Ok(::exprbind::Value::F64(#ident( #( #call_args ),* )))
        }

        ::exprbind::inventory::submit! {
            ::exprbind::FnMeta {
                name: #name_str,
                type_name: #type_name,
                arity: #arity_lit,
                invoke: #shim_ident,
            }
        }
    };

    output.into()
}
