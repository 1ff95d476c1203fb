diesel::table! {
    short_urls (code) {
        code -> Text,
        target_url -> Text,
        target_hash -> Text,
        created_at -> BigInt,
        expires_at -> BigInt,
    }
}
