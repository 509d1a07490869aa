use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input};

/// Property name reserved for the entity state filter.
const RESERVED_STATE: &str = "_state";

/// Bare field flags accepted as shorthand for tag options.
const FIELD_FLAGS: &[&str] = &[
    "omitempty",
    "pii",
    "personal",
    "gdpr",
    "user",
    "unique",
    "primary",
    "indexed",
    "query",
    "searchable",
    "search",
    "immutable",
    "deprecated",
    "required",
    "req",
    "lookup",
    "verify",
    "metric",
    "metric_filter",
    "metricFilter",
    "no_snapshot",
    "skip_snapshot",
];

/// Derives `keystone::mapper::Properties` for a nested composite, plus the
/// `FieldValue` impl that lets it appear as a field of another record.
#[proc_macro_derive(Properties, attributes(keystone))]
pub fn derive_properties(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_properties(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `keystone::Entity` (and `Properties`) for a top-level record.
#[proc_macro_derive(Entity, attributes(keystone))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_properties(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = collect_fields(&input, "Properties")?;
    let ident = &input.ident;
    let walkers = expand_walkers(ident, &fields);

    Ok(quote! {
        #walkers
        ::keystone::composite_field!(#ident);
    })
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = collect_fields(&input, "Entity")?;
    let options = parse_entity_attrs(&input)?;
    let ident = &input.ident;
    let walkers = expand_walkers(ident, &fields);

    let type_name = ident.to_string();
    let mut builders = Vec::new();
    if let Some(key) = &options.type_name {
        builders.push(quote!(.with_type(#key)));
    }
    if let Some(name) = &options.name {
        builders.push(quote!(.with_name(#name)));
    }
    if let Some(singular) = &options.singular {
        builders.push(quote!(.with_singular(#singular)));
    }
    if let Some(plural) = &options.plural {
        builders.push(quote!(.with_plural(#plural)));
    }
    if let Some(description) = &options.description {
        builders.push(quote!(.with_description(#description)));
    }
    if options.time_series {
        builders.push(quote!(.with_kind(::keystone::schema::EntityKind::TimeSeries)));
    }
    for option in &options.schema_options {
        builders.push(quote!(.with_option(::keystone::schema::SchemaOption::#option)));
    }

    let embedded = fields
        .iter()
        .filter(|field| field.embed)
        .map(|field| &field.ident);

    Ok(quote! {
        #walkers

        impl ::keystone::Entity for #ident {
            fn definition() -> ::keystone::schema::EntityDefinition {
                ::keystone::schema::EntityDefinition::new(#type_name)
                    #(#builders)*
                    .with_properties(::keystone::mapper::describe::<Self>())
            }

            fn traits(&mut self) -> ::keystone::entity::EntityTraits<'_> {
                ::keystone::entity::EntityTraits::default()
                    #(.with(&mut self.#embedded))*
            }
        }
    })
}

struct MappedField {
    ident: Ident,
    ty: Type,
    tag: String,
    embed: bool,
}

fn collect_fields(input: &DeriveInput, derive: &str) -> syn::Result<Vec<MappedField>> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("#[derive({derive})] does not support generic structs; implement the traits by hand"),
        ));
    }

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                format!("#[derive({derive})] supports only structs"),
            ));
        }
    };

    let named = match &data.fields {
        Fields::Named(named) => named,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                format!("#[derive({derive})] requires named fields"),
            ));
        }
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }

        let tag = attrs.lower();
        let name = tag.split(',').next().unwrap_or_default().trim();
        if name == "-" {
            continue;
        }
        if name == RESERVED_STATE {
            return Err(syn::Error::new_spanned(
                field,
                format!("`{RESERVED_STATE}` is reserved for the entity state filter"),
            ));
        }

        fields.push(MappedField {
            ident,
            ty: field.ty.clone(),
            tag,
            embed: attrs.embed,
        });
    }
    Ok(fields)
}

#[derive(Default)]
struct FieldAttrs {
    tag: Option<String>,
    name: Option<String>,
    skip: bool,
    embed: bool,
    flags: Vec<String>,
}

impl FieldAttrs {
    /// Lowers every attribute form to one `name, opt, ...` tag string.
    fn lower(&self) -> String {
        let mut tokens: Vec<String> = match &self.tag {
            Some(tag) => tag.split(',').map(|token| token.trim().to_string()).collect(),
            None => vec![String::new()],
        };
        if let Some(name) = &self.name {
            tokens[0] = name.clone();
        }
        for flag in &self.flags {
            if !tokens[1..].contains(flag) {
                tokens.push(flag.clone());
            }
        }
        tokens.join(",")
    }
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("keystone") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.tag = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                parsed.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("embed") {
                parsed.embed = true;
                return Ok(());
            }

            if let Some(flag) = meta.path.get_ident().map(Ident::to_string) {
                if FIELD_FLAGS.contains(&flag.as_str()) {
                    parsed.flags.push(flag);
                    return Ok(());
                }
            }

            Err(meta.error(
                "Unsupported #[keystone(...)] field option. Supported: tag = \"...\", name = \"...\", skip, embed, or a flag such as unique, indexed, pii, omitempty",
            ))
        })?;
    }

    Ok(parsed)
}

#[derive(Default)]
struct EntityAttrs {
    type_name: Option<String>,
    name: Option<String>,
    singular: Option<String>,
    plural: Option<String>,
    description: Option<String>,
    time_series: bool,
    schema_options: Vec<Ident>,
}

fn parse_entity_attrs(input: &DeriveInput) -> syn::Result<EntityAttrs> {
    let mut options = EntityAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("keystone") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type") || meta.path.is_ident("key") {
                options.type_name = Some(text(&meta)?);
                return Ok(());
            }
            if meta.path.is_ident("name") {
                options.name = Some(text(&meta)?);
                return Ok(());
            }
            if meta.path.is_ident("singular") {
                options.singular = Some(text(&meta)?);
                return Ok(());
            }
            if meta.path.is_ident("plural") {
                options.plural = Some(text(&meta)?);
                return Ok(());
            }
            if meta.path.is_ident("description") {
                options.description = Some(text(&meta)?);
                return Ok(());
            }
            if meta.path.is_ident("time_series") {
                options.time_series = true;
                return Ok(());
            }

            let schema_option = if meta.path.is_ident("require_comments") {
                Some("RequireComments")
            } else if meta.path.is_ident("store_mutations") {
                Some("StoreMutations")
            } else if meta.path.is_ident("shareable") {
                Some("Shareable")
            } else {
                None
            };
            if let Some(variant) = schema_option {
                options
                    .schema_options
                    .push(Ident::new(variant, proc_macro2::Span::call_site()));
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[keystone(...)] entity option. Supported: type = \"...\", name = \"...\", singular = \"...\", plural = \"...\", description = \"...\", time_series, require_comments, store_mutations, shareable",
            ))
        })?;
    }

    Ok(options)
}

fn text(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// Compiled plan plus the four `Properties` walkers over it.
fn expand_walkers(ident: &Ident, fields: &[MappedField]) -> TokenStream2 {
    let mapped: Vec<&MappedField> = fields.iter().filter(|field| !field.embed).collect();

    let plan_entries = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let tag = &field.tag;
        quote!(::keystone::mapper::FieldPlan::new(#name, #tag))
    });

    let encode = mapped.iter().enumerate().map(|(index, field)| {
        let member = &field.ident;
        quote! {
            let field = &plan[#index];
            if !field.is_hydration_only() {
                ::keystone::mapper::FieldValue::encode_field(
                    &self.#member,
                    field.property(prefix),
                    field.tag(),
                    out,
                )?;
            }
        }
    });

    let decode = mapped.iter().enumerate().map(|(index, field)| {
        let member = &field.ident;
        quote! {
            ::keystone::mapper::FieldValue::decode_field(
                &mut self.#member,
                &plan[#index].property(prefix),
                input,
            )?;
        }
    });

    let describe = mapped.iter().enumerate().map(|(index, field)| {
        let ty = &field.ty;
        quote! {
            let field = &plan[#index];
            if !field.is_hydration_only() {
                <#ty as ::keystone::mapper::FieldValue>::describe_field(
                    field.property(prefix),
                    field.tag(),
                    out,
                );
            }
        }
    });

    let observe = mapped.iter().map(|field| {
        let member = &field.ident;
        quote!(::keystone::mapper::FieldValue::observe_field(&mut self.#member, success);)
    });

    quote! {
        impl #ident {
            #[doc(hidden)]
            fn __keystone_plan() -> &'static [::keystone::mapper::FieldPlan] {
                static PLAN: ::std::sync::OnceLock<::std::vec::Vec<::keystone::mapper::FieldPlan>> =
                    ::std::sync::OnceLock::new();
                PLAN.get_or_init(|| ::std::vec![#(#plan_entries),*])
            }
        }

        impl ::keystone::mapper::Properties for #ident {
            #[allow(unused_variables)]
            fn marshal_properties(
                &self,
                prefix: &str,
                out: &mut ::keystone::PropertyMap,
            ) -> ::keystone::Result<()> {
                let plan = Self::__keystone_plan();
                #(#encode)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn unmarshal_properties(
                &mut self,
                prefix: &str,
                input: &::keystone::PropertyMap,
            ) -> ::keystone::Result<()> {
                let plan = Self::__keystone_plan();
                #(#decode)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn describe_properties(
                prefix: &str,
                out: &mut ::std::vec::Vec<::keystone::schema::PropertyDefinition>,
            ) {
                let plan = Self::__keystone_plan();
                #(#describe)*
            }

            #[allow(unused_variables)]
            fn observe_properties(&mut self, success: bool) {
                #(#observe)*
            }
        }
    }
}
