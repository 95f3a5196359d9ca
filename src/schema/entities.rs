use super::{Entity, Field, FieldKind, Schema};

const BASIC_HTML: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "li", "ol", "p", "pre", "span", "strike", "strong", "sub", "sup", "u", "ul",
];

const NAME: Field = Field::new("name", FieldKind::Text { min: 1, max: 200 }).required();
const TEXT: FieldKind = FieldKind::Text { min: 0, max: 500 };
/// Owning project of a resource; set from the path.
const PROJECT_ID: Field = Field::new("projectId", FieldKind::Id).sensitive().system();
const INDEX: FieldKind = FieldKind::Integer {
    min: 0,
    max: i64::MAX,
};

static PROJECT: Schema = Schema {
    entity: Entity::Project,
    fields: &[
        NAME,
        Field::new("description", FieldKind::Html { allowed: BASIC_HTML }),
        Field::new("image", TEXT),
        Field::new("category", FieldKind::Integer { min: 1, max: 100 }),
        Field::new("subCategory", TEXT),
        Field::new("public", FieldKind::Bool),
        Field::new("curFile", FieldKind::Id).sensitive(),
        Field::new("type", INDEX),
        Field::new("tags", FieldKind::TextArray),
        Field::new("plugins", FieldKind::IdArray { min: 1 }).required(),
        Field::new("files", FieldKind::IdArray { min: 0 }).sensitive(),
        Field::new("readPrivileges", FieldKind::TextArray).sensitive(),
        Field::new("writePrivileges", FieldKind::TextArray).sensitive(),
        Field::new("adminPrivileges", FieldKind::TextArray).sensitive(),
        Field::new("rating", FieldKind::Number { min: 0.0, max: 100.0 }).system(),
        Field::new("score", FieldKind::Number { min: 0.0, max: f64::MAX }).system(),
        Field::new("numRaters", INDEX).system(),
        Field::new("suspicious", FieldKind::Bool).sensitive().system(),
        Field::new("deleted", FieldKind::Bool).system(),
        Field::new("build", FieldKind::Id).sensitive().system(),
        Field::new("user", TEXT).system(),
    ],
};

static BUILD: Schema = Schema {
    entity: Entity::Build,
    fields: &[
        Field::new("name", TEXT),
        Field::new("notes", FieldKind::Html { allowed: BASIC_HTML }),
        Field::new("version", FieldKind::Text { min: 1, max: 20 }),
        Field::new("html", FieldKind::Html { allowed: BASIC_HTML }),
        Field::new("css", FieldKind::Raw),
        Field::new("public", FieldKind::Bool),
        Field::new("liveHTML", FieldKind::Raw),
        Field::new("liveLink", TEXT),
        Field::new("liveToken", TEXT).sensitive(),
        Field::new("totalVotes", INDEX).system(),
        Field::new("totalVoters", INDEX).system(),
        Field::new("projectId", FieldKind::Id).sensitive().system(),
        Field::new("user", TEXT).system(),
    ],
};

static ASSET: Schema = Schema {
    entity: Entity::Asset,
    fields: &[
        NAME,
        Field::new("className", FieldKind::Text { min: 1, max: 200 }).required(),
        Field::new("json", FieldKind::Json),
        PROJECT_ID,
    ],
};

static GROUP: Schema = Schema {
    entity: Entity::Group,
    fields: &[NAME, Field::new("items", FieldKind::IntArray), PROJECT_ID],
};

static CONTAINER: Schema = Schema {
    entity: Entity::Container,
    fields: &[NAME, Field::new("json", FieldKind::Json), PROJECT_ID],
};

static SCRIPT: Schema = Schema {
    entity: Entity::Script,
    fields: &[
        Field::new("name", TEXT),
        Field::new("onEnter", FieldKind::Raw),
        Field::new("onInitialize", FieldKind::Raw),
        Field::new("onDispose", FieldKind::Raw),
        Field::new("onFrame", FieldKind::Raw),
        PROJECT_ID,
    ],
};

static PLUGIN: Schema = Schema {
    entity: Entity::Plugin,
    fields: &[
        NAME,
        Field::new("description", FieldKind::Html { allowed: BASIC_HTML }),
        Field::new("plan", FieldKind::Integer { min: 1, max: 6 }),
        Field::new("url", TEXT),
        Field::new("deployables", FieldKind::TextArray),
        Field::new("image", TEXT),
        Field::new("author", TEXT),
        Field::new("version", FieldKind::Text { min: 1, max: 20 }),
        Field::new("isPublic", FieldKind::Bool).sensitive(),
    ],
};

static USER_META: Schema = Schema {
    entity: Entity::UserMeta,
    fields: &[
        Field::new("bio", FieldKind::Html { allowed: BASIC_HTML }),
        Field::new("image", TEXT),
        Field::new("website", TEXT),
        Field::new("plan", FieldKind::Integer { min: 1, max: 6 })
            .sensitive()
            .restricted(),
        Field::new("maxProjects", FieldKind::Integer { min: 0, max: 10_000 })
            .sensitive()
            .restricted(),
        Field::new("customerId", TEXT).sensitive().restricted(),
        Field::new("user", TEXT).system(),
    ],
};

static FILE: Schema = Schema {
    entity: Entity::File,
    fields: &[
        NAME,
        Field::new("favourite", FieldKind::Bool),
        Field::new("global", FieldKind::Bool),
        Field::new("browsable", FieldKind::Bool),
        Field::new("tags", FieldKind::TextArray).sensitive(),
        Field::new("projectId", FieldKind::Id),
        Field::new("url", TEXT).sensitive().system(),
        Field::new("previewUrl", TEXT).sensitive().system(),
        Field::new("identifier", TEXT).sensitive().system(),
        Field::new("bucketId", TEXT).system(),
        Field::new("user", TEXT).system(),
    ],
};

pub(super) fn lookup(entity: Entity) -> &'static Schema {
    match entity {
        Entity::Project => &PROJECT,
        Entity::Build => &BUILD,
        Entity::Asset => &ASSET,
        Entity::Group => &GROUP,
        Entity::Container => &CONTAINER,
        Entity::Script => &SCRIPT,
        Entity::Plugin => &PLUGIN,
        Entity::UserMeta => &USER_META,
        Entity::File => &FILE,
    }
}
