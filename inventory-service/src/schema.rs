diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Text,
        price -> Numeric,
        stock -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
