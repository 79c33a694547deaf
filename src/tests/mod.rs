mod template_provisioning;
