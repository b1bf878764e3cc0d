pub(crate) const TEST_TENANT_NAME: &str = "Acme Corporation";
pub(crate) const TEST_OWNER_EMAIL: &str = "admin@acme.com";
pub(crate) const TEST_SECOND_TENANT_NAME: &str = "Tech Startup Inc";
pub(crate) const TEST_SECOND_OWNER_EMAIL: &str = "admin@techstartup.com";
pub(crate) const TEST_USER_EMAIL: &str = "student@acme.com";
pub(crate) const TEST_USER_NAME: &str = "student";
pub(crate) const TEST_PASSWORD: &str = "correct horse battery staple";
