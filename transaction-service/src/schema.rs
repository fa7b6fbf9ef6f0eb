diesel::table! {
    transactions (id) {
        id -> Uuid,
        product_id -> Uuid,
        status -> Varchar,
        gateway_transaction_id -> Nullable<Varchar>,
        delivery_address -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    deliveries (id) {
        id -> Uuid,
        transaction_id -> Uuid,
        address -> Text,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    transactions,
    deliveries,
);
