pub const CREATE_INCIDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS incidents (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    severity TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    radius_meters INTEGER NOT NULL CHECK (radius_meters > 0),
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
"#;

pub const CREATE_INCIDENTS_ACTIVE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_incidents_active ON incidents (is_active, created_at DESC);
"#;

pub const CREATE_LOCATION_CHECKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS location_checks (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    is_in_danger_zone BOOLEAN NOT NULL,
    checked_at TIMESTAMPTZ NOT NULL
);
"#;

pub const CREATE_LOCATION_CHECK_INCIDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS location_check_incidents (
    check_id UUID NOT NULL REFERENCES location_checks (id),
    incident_id UUID NOT NULL REFERENCES incidents (id),
    PRIMARY KEY (check_id, incident_id)
);
"#;

pub const CREATE_LOCATION_CHECKS_TIME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_location_checks_checked_at ON location_checks (checked_at);
"#;

pub const SCHEMA: [&str; 5] = [
    CREATE_INCIDENTS_TABLE,
    CREATE_INCIDENTS_ACTIVE_INDEX,
    CREATE_LOCATION_CHECKS_TABLE,
    CREATE_LOCATION_CHECK_INCIDENTS_TABLE,
    CREATE_LOCATION_CHECKS_TIME_INDEX,
];

pub const INSERT_INCIDENT: &str = r#"
INSERT INTO incidents (
    id, title, description, severity, latitude, longitude, radius_meters,
    is_active, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10);
"#;

pub const SELECT_INCIDENT_BY_ID: &str = r#"
SELECT id, title, description, severity, latitude, longitude, radius_meters,
       is_active, created_at, updated_at
FROM incidents
WHERE id = $1;
"#;

pub const COUNT_INCIDENTS: &str = r#"
SELECT COUNT(*) FROM incidents;
"#;

pub const SELECT_INCIDENTS_PAGE: &str = r#"
SELECT id, title, description, severity, latitude, longitude, radius_meters,
       is_active, created_at, updated_at
FROM incidents
ORDER BY created_at DESC
LIMIT $1 OFFSET $2;
"#;

pub const SELECT_ACTIVE_INCIDENTS: &str = r#"
SELECT id, title, description, severity, latitude, longitude, radius_meters,
       is_active, created_at, updated_at
FROM incidents
WHERE is_active = true
ORDER BY created_at DESC;
"#;

pub const SELECT_INCIDENT_FOR_UPDATE: &str = r#"
SELECT id, title, description, severity, latitude, longitude, radius_meters,
       is_active, created_at, updated_at
FROM incidents
WHERE id = $1
FOR UPDATE;
"#;

pub const UPDATE_INCIDENT: &str = r#"
UPDATE incidents
SET title = $2,
    description = $3,
    severity = $4,
    latitude = $5,
    longitude = $6,
    radius_meters = $7,
    updated_at = $8
WHERE id = $1;
"#;

pub const DEACTIVATE_INCIDENT: &str = r#"
UPDATE incidents
SET is_active = false,
    updated_at = $2
WHERE id = $1 AND is_active = true;
"#;

pub const INSERT_LOCATION_CHECK: &str = r#"
INSERT INTO location_checks (
    id, user_id, latitude, longitude, is_in_danger_zone, checked_at
) VALUES ($1, $2, $3, $4, $5, $6);
"#;

pub const INSERT_LOCATION_CHECK_INCIDENTS: &str = r#"
INSERT INTO location_check_incidents (check_id, incident_id)
SELECT $1, UNNEST($2::uuid[]);
"#;

pub const SELECT_STATS_BY_INCIDENT: &str = r#"
SELECT i.id AS incident_id,
       i.title,
       COUNT(DISTINCT lc.user_id) AS user_count
FROM incidents i
LEFT JOIN location_check_incidents lci ON i.id = lci.incident_id
LEFT JOIN location_checks lc ON lc.id = lci.check_id AND lc.checked_at >= $1
WHERE i.is_active = true
GROUP BY i.id, i.title, i.created_at
ORDER BY i.created_at DESC;
"#;
