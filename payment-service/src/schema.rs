diesel::table! {
    customers (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        saved_card -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
