// SQLite schema definitions
// Mirrors schema.rs with SQLite-compatible types; timestamps and dates are stored as text.

diesel::table! {
    tours (id) {
        id -> BigInt,
        title -> Text,
        description -> Nullable<Text>,
        location -> Text,
        duration_days -> Integer,
        price -> Double,
        max_guests -> Integer,
        image_url -> Nullable<Text>,
        highlights -> Nullable<Text>,
        included -> Nullable<Text>,
        gallery_images -> Nullable<Text>,
        gallery_videos -> Nullable<Text>,
        is_featured -> Bool,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    bookings (id) {
        id -> BigInt,
        tour_id -> BigInt,
        guest_name -> Text,
        guest_email -> Text,
        guest_phone -> Text,
        guest_count -> Integer,
        preferred_date -> Nullable<Text>,
        message -> Nullable<Text>,
        status -> Text,
        total_price -> Double,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    admin_users (id) {
        id -> BigInt,
        username -> Text,
        email -> Nullable<Text>,
        password_hash -> Text,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    admin_sessions (id) {
        id -> BigInt,
        token_hash -> Text,
        admin_user_id -> BigInt,
        created_at -> Text,
        expires_at -> Text,
    }
}

diesel::joinable!(bookings -> tours (tour_id));
diesel::joinable!(admin_sessions -> admin_users (admin_user_id));

diesel::allow_tables_to_appear_in_same_query!(tours, bookings, admin_users, admin_sessions,);
