use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh, isolated server, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`], the
/// server's `Ledger`, and its bundled `LocalOracle` (for encrypting votes).
///
/// `#[backend_test(owner)]` and `#[backend_test(voter)]` sign the client in
/// with the matching test wallet first.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Sign the client in as owner/voter if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "owner" => quote! {
            crate::test_support::sign_in(&rocket_client, &crate::test_support::owner()).await;
        },
        Some(arg) if arg == "voter" => quote! {
            crate::test_support::sign_in(&rocket_client, &crate::test_support::voter()).await;
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `owner` or `voter`")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_test())
                    .await
                    .unwrap();

                #maybe_login

                let ledger = rocket_client
                    .rocket()
                    .state::<crate::model::ledger::Ledger>()
                    .unwrap()
                    .clone();
                let oracle = rocket_client
                    .rocket()
                    .state::<crate::model::oracle::LocalOracle>()
                    .unwrap()
                    .clone();
                let _ = (&ledger, &oracle);

                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen: Vec<String> = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                let type_ident = type_path.path.segments.last().unwrap().ident.to_string();
                let injected = match type_ident.as_str() {
                    "Client" => Some(quote! { rocket_client }),
                    "Ledger" => Some(quote! { ledger.clone() }),
                    "LocalOracle" => Some(quote! { oracle.clone() }),
                    _ => None,
                };
                if let Some(injected) = injected {
                    if seen.contains(&type_ident) {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{type_ident}`"),
                        ));
                    }
                    seen.push(type_ident);
                    args.push(injected);
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client: Client`, `ledger: Ledger` or `oracle: LocalOracle`",
        ));
    }

    Ok(args)
}
