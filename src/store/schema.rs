pub const SCHEMA: &str = r#"
-- Every entity is stored as a JSON document; columns used for lookups are
-- generated from the document so they can never drift from it.

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    owner TEXT GENERATED ALWAYS AS (json_extract(doc, '$.user')) VIRTUAL,
    name TEXT GENERATED ALWAYS AS (json_extract(doc, '$.name')) VIRTUAL
);

-- Builds may exist before their project is linked
CREATE TABLE IF NOT EXISTS builds (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    owner TEXT GENERATED ALWAYS AS (json_extract(doc, '$.user')) VIRTUAL,
    project_id TEXT GENERATED ALWAYS AS (json_extract(doc, '$.projectId')) VIRTUAL
);

-- Assets, groups, containers and scripts share one table keyed by kind
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    doc TEXT NOT NULL,
    owner TEXT GENERATED ALWAYS AS (json_extract(doc, '$.user')) VIRTUAL,
    project_id TEXT GENERATED ALWAYS AS (json_extract(doc, '$.projectId')) VIRTUAL,
    name TEXT GENERATED ALWAYS AS (json_extract(doc, '$.name')) VIRTUAL,
    shallow_id INTEGER GENERATED ALWAYS AS (json_extract(doc, '$.shallowId')) VIRTUAL
);

CREATE TABLE IF NOT EXISTS plugins (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    name TEXT GENERATED ALWAYS AS (json_extract(doc, '$.name')) VIRTUAL,
    is_public INTEGER GENERATED ALWAYS AS (json_extract(doc, '$.isPublic')) VIRTUAL
);

-- One row per user account
CREATE TABLE IF NOT EXISTS user_meta (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    owner TEXT GENERATED ALWAYS AS (json_extract(doc, '$.user')) VIRTUAL
);

-- Metadata of files held by the file service
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    owner TEXT GENERATED ALWAYS AS (json_extract(doc, '$.user')) VIRTUAL,
    project_id TEXT GENERATED ALWAYS AS (json_extract(doc, '$.projectId')) VIRTUAL,
    name TEXT GENERATED ALWAYS AS (json_extract(doc, '$.name')) VIRTUAL,
    identifier TEXT GENERATED ALWAYS AS (json_extract(doc, '$.identifier')) VIRTUAL,
    bucket_name TEXT GENERATED ALWAYS AS (json_extract(doc, '$.bucketName')) VIRTUAL,
    favourite INTEGER GENERATED ALWAYS AS (json_extract(doc, '$.favourite')) VIRTUAL,
    global INTEGER GENERATED ALWAYS AS (json_extract(doc, '$.global')) VIRTUAL,
    browsable INTEGER GENERATED ALWAYS AS (json_extract(doc, '$.browsable')) VIRTUAL
);

-- Bearer credentials issued on behalf of the identity service
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of ID for fast lookup
    username TEXT NOT NULL,
    privileges INTEGER NOT NULL DEFAULT 3,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner);
CREATE INDEX IF NOT EXISTS idx_builds_project ON builds(project_id);
CREATE INDEX IF NOT EXISTS idx_builds_owner ON builds(owner);
CREATE INDEX IF NOT EXISTS idx_resources_project ON resources(kind, project_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_resources_shallow ON resources(kind, project_id, shallow_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_meta_owner ON user_meta(owner);
CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner);
CREATE INDEX IF NOT EXISTS idx_files_identifier ON files(identifier);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_username ON tokens(username);
"#;
