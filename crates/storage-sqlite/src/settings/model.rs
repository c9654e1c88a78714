use diesel::prelude::*;

#[derive(Queryable, Insertable, Selectable, Identifiable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(setting_key))]
#[diesel(table_name = crate::schema::app_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppSettingDB {
    pub setting_key: String,
    pub setting_value: String,
}
