/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel schema definitions.
//!
//! Must stay in sync with the SQL in `migrations/`.

diesel::table! {
    jobs (id) {
        id -> Binary,
        owner -> Text,
        payload -> Text,
        status -> Text,
        result_key -> Nullable<Text>,
        error_class -> Nullable<Text>,
        error_message -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    job_outbox (id) {
        id -> Integer,
        job_id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    envelopes (id) {
        id -> Binary,
        location -> Text,
        size -> BigInt,
        content_type -> Text,
        arrived_at -> Text,
        delivery_count -> Integer,
        enqueued_at -> Text,
        visible_at -> Text,
        dead_letter -> Bool,
        last_error -> Nullable<Text>,
    }
}

diesel::table! {
    ingested_records (natural_key) {
        natural_key -> Binary,
        source_location -> Text,
        document -> Text,
        content_hash -> Text,
        ingested_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(jobs, job_outbox, envelopes, ingested_records);
